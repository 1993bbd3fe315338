//! Builtin tools: clock and workspace file access

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::local::{LocalCapabilities, ToolTrait};
use crate::{CapabilityError, Result};

/// Register the four builtin tools
pub fn register_builtin_tools(caps: &mut LocalCapabilities, workspace: &Path) {
    caps.register(SystemTimeTool);
    caps.register(ListFilesTool::new(workspace.to_path_buf()));
    caps.register(ReadFileTool::new(workspace.to_path_buf()));
    caps.register(WriteFileTool::new(workspace.to_path_buf()));
}

/// Relative paths land in the workspace; `~` is expanded
pub fn resolve_path(path: &str, workspace: &Path) -> PathBuf {
    if path.starts_with('~') {
        stepwise_config::expand_tilde(path)
    } else {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            workspace.join(candidate)
        }
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args)
        .map_err(|e| CapabilityError::InvalidArguments(format!("{}: {}", tool, e)))
}

fn io_fault(action: &str, path: &str, e: std::io::Error) -> CapabilityError {
    CapabilityError::Fault(format!("{} {}: {}", action, path, e))
}

/// Current local time
pub struct SystemTimeTool;

#[async_trait]
impl ToolTrait for SystemTimeTool {
    fn name(&self) -> &str {
        "get_system_time"
    }
    fn description(&self) -> &str {
        "Get the current local date and time."
    }
    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _args: Value) -> Result<String> {
        Ok(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

/// Directory listing
pub struct ListFilesTool {
    workspace: PathBuf,
}

impl ListFilesTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct ListFilesArgs {
    #[serde(default = "current_dir")]
    directory: String,
}

fn current_dir() -> String {
    ".".to_string()
}

#[async_trait]
impl ToolTrait for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }
    fn description(&self) -> &str {
        "List the entries of a directory. Defaults to the workspace."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "directory": {"type": "string", "description": "Directory to list"}
            }
        })
    }
    async fn execute(&self, args: Value) -> Result<String> {
        let args: ListFilesArgs = parse_args(self.name(), args)?;
        let path = resolve_path(&args.directory, &self.workspace);
        debug!("listing {:?}", path);

        let mut dir = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| io_fault("cannot list", &args.directory, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| io_fault("cannot list", &args.directory, e))?
        {
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }
        entries.sort();

        Ok(format!("DIR {}: {}", args.directory, entries.join(", ")))
    }
}

/// Whole-file read as UTF-8
pub struct ReadFileTool {
    workspace: PathBuf,
}

impl ReadFileTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct ReadFileArgs {
    filename: String,
}

#[async_trait]
impl ToolTrait for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "Read a text file and return its contents."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {"type": "string", "description": "File to read"}
            },
            "required": ["filename"]
        })
    }
    async fn execute(&self, args: Value) -> Result<String> {
        let args: ReadFileArgs = parse_args(self.name(), args)?;
        let path = resolve_path(&args.filename, &self.workspace);
        debug!("reading {:?}", path);

        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_fault("cannot read", &args.filename, e))
    }
}

/// Whole-file write, replacing any previous content
pub struct WriteFileTool {
    workspace: PathBuf,
}

impl WriteFileTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct WriteFileArgs {
    filename: String,
    content: String,
}

#[async_trait]
impl ToolTrait for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }
    fn description(&self) -> &str {
        "Write text to a file, replacing its contents. Creates parent directories."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {"type": "string", "description": "File to write"},
                "content": {"type": "string", "description": "Text to write"}
            },
            "required": ["filename", "content"]
        })
    }
    async fn execute(&self, args: Value) -> Result<String> {
        let args: WriteFileArgs = parse_args(self.name(), args)?;
        let path = resolve_path(&args.filename, &self.workspace);
        debug!("writing {} bytes to {:?}", args.content.len(), path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_fault("cannot write", &args.filename, e))?;
        }
        tokio::fs::write(&path, &args.content)
            .await
            .map_err(|e| io_fault("cannot write", &args.filename, e))?;

        Ok(format!("SUCCESS: File {} has been written.", args.filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_joins_workspace() {
        let ws = Path::new("/tmp/ws");
        assert_eq!(resolve_path("a.txt", ws), PathBuf::from("/tmp/ws/a.txt"));
        assert_eq!(resolve_path(".", ws), PathBuf::from("/tmp/ws/."));
    }

    #[test]
    fn test_resolve_absolute_untouched() {
        let ws = Path::new("/tmp/ws");
        assert_eq!(resolve_path("/etc/hosts", ws), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_resolve_tilde() {
        let resolved = resolve_path("~/notes.txt", Path::new("/tmp/ws"));
        if let Some(home) = dirs_home() {
            assert_eq!(resolved, home.join("notes.txt"));
        }
    }

    fn dirs_home() -> Option<PathBuf> {
        match stepwise_config::expand_tilde("~") {
            p if p == Path::new("~") => None,
            p => Some(p),
        }
    }

    #[tokio::test]
    async fn test_system_time_format() {
        let out = SystemTimeTool.execute(Value::Null).await.unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(&out, "%Y-%m-%d %H:%M:%S").is_ok());
    }

    #[tokio::test]
    async fn test_write_requires_content() {
        let tool = WriteFileTool::new(PathBuf::from("/tmp"));
        let err = tool.execute(json!({"filename": "x"})).await.unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidArguments(_)));
    }
}
