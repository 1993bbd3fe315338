//! Execution node: one plan step through a bounded tool-calling loop

use std::sync::Arc;
use tracing::{debug, info, warn};

use stepwise_capability::CapabilityRegistry;
use stepwise_provider::{ChatParams, Message, Provider, ToolCall, ToolChoice};
use stepwise_session::{ConversationState, StateUpdate};

use crate::prompts::PromptTemplates;
use crate::{AgentError, AgentSettings, Result};

pub const TIMEOUT_OBSERVATION: &str =
    "ERROR: tool call reached the time limit. Retry or try another tool";
pub const EXHAUSTED_SUMMARY: &str = "Executor loop reached limit without a text summary.";

/// Carries out `plan[0]` and records its result
pub struct Executor<P: Provider> {
    provider: Arc<P>,
    registry: CapabilityRegistry,
    prompts: Arc<PromptTemplates>,
    settings: AgentSettings,
}

impl<P: Provider> Executor<P> {
    pub fn new(
        provider: Arc<P>,
        registry: CapabilityRegistry,
        prompts: Arc<PromptTemplates>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            provider,
            registry,
            prompts,
            settings,
        }
    }

    pub async fn run(&self, state: &ConversationState) -> Result<StateUpdate> {
        let step = state.current_step().ok_or(AgentError::EmptyPlan)?.to_string();
        info!("executing step: {}", step);

        let mut history = state.internal_history.clone();
        if history.is_empty() {
            history.push(Message::system(
                self.prompts.render_executor(&step, &state.past_steps),
            ));
        }

        let mut summary = None;
        for iteration in 1..=self.settings.executor_max_iterations {
            debug!("executor iteration {}", iteration);

            let params = ChatParams {
                model: self.settings.model.clone(),
                messages: history.clone(),
                tools: self.registry.definitions(),
                tool_choice: ToolChoice::Auto,
                max_tokens: self.settings.max_tokens,
                temperature: self.settings.temperature,
            };
            let response = self.provider.chat(params).await?;
            history.push(response.to_message());

            if !response.has_tool_calls() {
                summary = Some(response.content.unwrap_or_default());
                break;
            }

            for call in &response.tool_calls {
                let observation = self.observe(call).await;
                history.push(Message::tool(&call.id, &call.name, observation));
            }
        }

        let result = summary.unwrap_or_else(|| {
            warn!("step '{}' produced no text summary", step);
            EXHAUSTED_SUMMARY.to_string()
        });
        info!("step done: {}", result);

        Ok(StateUpdate::default()
            .with_past_step(format!("Step: {} | Result: {}", step, result))
            .with_plan(state.plan[1..].to_vec())
            .with_internal_history(Vec::new()))
    }

    /// Run one tool call to an observation; failures never escape
    async fn observe(&self, call: &ToolCall) -> String {
        info!("tool call: {}({})", call.name, call.arguments);

        let invocation = self.registry.invoke(&call.name, call.arguments.clone());
        let observation = match tokio::time::timeout(self.settings.tool_timeout, invocation).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("tool {} failed: {}", call.name, e);
                format!("ERROR: {}", e)
            }
            Err(_) => {
                warn!(
                    "tool {} timed out after {:?}",
                    call.name, self.settings.tool_timeout
                );
                TIMEOUT_OBSERVATION.to_string()
            }
        };

        debug!("observation: {}", observation);
        observation
    }
}
