//! Tests for the builtin tool set

use serde_json::json;
use std::fs;
use stepwise_capability::{CapabilityError, CapabilityProvider, LocalCapabilities};
use tempfile::TempDir;

#[tokio::test]
async fn test_write_then_read_relative_to_workspace() {
    let workspace = TempDir::new().unwrap();
    let caps = LocalCapabilities::builtin(workspace.path());

    let written = caps
        .call_tool(
            "write_file",
            json!({"filename": "notes/todo.txt", "content": "buy milk"}),
        )
        .await
        .unwrap();
    assert_eq!(written, "SUCCESS: File notes/todo.txt has been written.");
    assert_eq!(
        fs::read_to_string(workspace.path().join("notes/todo.txt")).unwrap(),
        "buy milk"
    );

    let read = caps
        .call_tool("read_file", json!({"filename": "notes/todo.txt"}))
        .await
        .unwrap();
    assert_eq!(read, "buy milk");
}

#[tokio::test]
async fn test_write_replaces_content() {
    let workspace = TempDir::new().unwrap();
    fs::write(workspace.path().join("a.txt"), "old content").unwrap();
    let caps = LocalCapabilities::builtin(workspace.path());

    caps.call_tool("write_file", json!({"filename": "a.txt", "content": "new"}))
        .await
        .unwrap();
    assert_eq!(fs::read_to_string(workspace.path().join("a.txt")).unwrap(), "new");
}

#[tokio::test]
async fn test_list_files_defaults_to_workspace() {
    let workspace = TempDir::new().unwrap();
    fs::write(workspace.path().join("b.txt"), "").unwrap();
    fs::write(workspace.path().join("a.txt"), "").unwrap();
    fs::create_dir(workspace.path().join("sub")).unwrap();
    let caps = LocalCapabilities::builtin(workspace.path());

    let listing = caps.call_tool("list_files", json!({})).await.unwrap();
    assert_eq!(listing, "DIR .: a.txt, b.txt, sub");

    let null_args = caps.call_tool("list_files", serde_json::Value::Null).await.unwrap();
    assert_eq!(null_args, listing);
}

#[tokio::test]
async fn test_list_files_absolute_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("only.txt"), "").unwrap();
    let caps = LocalCapabilities::builtin(&dir.path().join("unused"));

    let target = dir.path().to_str().unwrap();
    let listing = caps
        .call_tool("list_files", json!({"directory": target}))
        .await
        .unwrap();
    assert_eq!(listing, format!("DIR {}: only.txt", target));
}

#[tokio::test]
async fn test_read_missing_file_is_fault() {
    let workspace = TempDir::new().unwrap();
    let caps = LocalCapabilities::builtin(workspace.path());

    let err = caps
        .call_tool("read_file", json!({"filename": "nope.txt"}))
        .await
        .unwrap_err();
    assert!(matches!(err, CapabilityError::Fault(_)));
    assert!(err.to_string().contains("nope.txt"));
}

#[tokio::test]
async fn test_list_missing_directory_is_fault() {
    let workspace = TempDir::new().unwrap();
    let caps = LocalCapabilities::builtin(workspace.path());

    let err = caps
        .call_tool("list_files", json!({"directory": "missing"}))
        .await
        .unwrap_err();
    assert!(matches!(err, CapabilityError::Fault(_)));
}

#[tokio::test]
async fn test_system_time_ignores_arguments() {
    let workspace = TempDir::new().unwrap();
    let caps = LocalCapabilities::builtin(workspace.path());

    let now = caps
        .call_tool("get_system_time", json!({"extra": true}))
        .await
        .unwrap();
    assert_eq!(now.len(), "2024-01-01 00:00:00".len());
}

#[tokio::test]
async fn test_builtin_schemas_declare_required() {
    let workspace = TempDir::new().unwrap();
    let caps = LocalCapabilities::builtin(workspace.path());
    let tools = caps.list_tools().await.unwrap();

    let write = tools.iter().find(|t| t.name == "write_file").unwrap();
    assert_eq!(write.parameters["required"], json!(["filename", "content"]));

    let list = tools.iter().find(|t| t.name == "list_files").unwrap();
    assert!(list.parameters.get("required").is_none());
}
