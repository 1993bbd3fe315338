//! Prompt templates for the planner, replanner and executor
//!
//! Each template has a builtin default. A file of the same role in the
//! workspace (`PLANNER.md`, `REPLANNER.md`, `EXECUTOR.md`) replaces it.

use chrono::Local;
use std::path::Path;
use tracing::{debug, info};

pub const PLANNER_FILE: &str = "PLANNER.md";
pub const REPLANNER_FILE: &str = "REPLANNER.md";
pub const EXECUTOR_FILE: &str = "EXECUTOR.md";

pub const DEFAULT_PLANNER: &str = r#"You are the planner of a task-execution agent.

Current time: {date}

Tools the executor can use:
{tools}

User request:
{query}

If you can answer the request directly from the conversation so far, call `act` with `response` set to the answer.
Otherwise call `act` with `steps`: a short ordered list of self-contained steps that, carried out with the tools above, will produce the answer. Do not add superfluous steps. The result of the final step should be the final answer."#;

pub const DEFAULT_REPLANNER: &str = r#"You are the replanner of a task-execution agent.

Current time: {date}

Tools the executor can use:
{tools}

User request:
{query}

Completed steps and their results:
{completed_steps}

Remaining steps of the current plan:
{remaining_steps}

If the completed steps are enough to answer the request, call `act` with `response` set to the final answer.
Otherwise call `act` with `steps` listing only the steps that still need to be done. Do not repeat completed steps."#;

pub const DEFAULT_EXECUTOR: &str = r#"You are the executor of a task-execution agent. Carry out exactly one step using the available tools.

Steps already completed:
{completed_steps}

Current step:
{current_step}

Call tools as needed. When the step is done, reply with a concise text summary of its result and call no further tools."#;

/// The three prompt templates in use
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplates {
    pub planner: String,
    pub replanner: String,
    pub executor: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            planner: DEFAULT_PLANNER.to_string(),
            replanner: DEFAULT_REPLANNER.to_string(),
            executor: DEFAULT_EXECUTOR.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Builtin templates with workspace overrides applied
    pub async fn load(workspace: &Path) -> Self {
        let mut templates = Self::default();
        for (file, slot) in [
            (PLANNER_FILE, &mut templates.planner),
            (REPLANNER_FILE, &mut templates.replanner),
            (EXECUTOR_FILE, &mut templates.executor),
        ] {
            let path = workspace.join(file);
            if !path.exists() {
                continue;
            }
            match tokio::fs::read_to_string(&path).await {
                Ok(content) if !content.trim().is_empty() => {
                    debug!("using prompt override {:?}", path);
                    *slot = content;
                }
                Ok(_) => debug!("ignoring empty prompt override {:?}", path),
                Err(e) => debug!("failed to read {:?}: {}", path, e),
            }
        }
        templates
    }

    /// Write the builtin templates into the workspace, keeping existing files
    pub async fn write_defaults(workspace: &Path) -> std::io::Result<Vec<String>> {
        tokio::fs::create_dir_all(workspace).await?;
        let defaults = Self::default();
        let mut written = Vec::new();
        for (file, content) in [
            (PLANNER_FILE, &defaults.planner),
            (REPLANNER_FILE, &defaults.replanner),
            (EXECUTOR_FILE, &defaults.executor),
        ] {
            let path = workspace.join(file);
            if path.exists() {
                continue;
            }
            tokio::fs::write(&path, content).await?;
            info!("created {:?}", path);
            written.push(file.to_string());
        }
        Ok(written)
    }

    pub fn render_planner(&self, tools: &str, query: &str) -> String {
        fill(
            &self.planner,
            &[("date", now().as_str()), ("tools", tools), ("query", query)],
        )
    }

    pub fn render_replanner(
        &self,
        tools: &str,
        query: &str,
        completed_steps: &[String],
        remaining_steps: &[String],
    ) -> String {
        fill(
            &self.replanner,
            &[
                ("date", now().as_str()),
                ("tools", tools),
                ("query", query),
                ("completed_steps", render_list(completed_steps).as_str()),
                ("remaining_steps", render_list(remaining_steps).as_str()),
            ],
        )
    }

    pub fn render_executor(&self, current_step: &str, completed_steps: &[String]) -> String {
        fill(
            &self.executor,
            &[
                ("current_step", current_step),
                ("completed_steps", render_list(completed_steps).as_str()),
            ],
        )
    }
}

fn now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in values {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}

/// Numbered lines, or `(none)`
fn render_list(items: &[String]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}
