//! Tests for tool registry

use async_trait::async_trait;
use codepilot_agent::tools::{
    default_tools, render, to_provider_tool, ListFilesTool, ReadFileTool, ToolError,
    ToolErrorKind, ToolRegistry, ToolResult, ToolSettings, ToolTrait,
};
use codepilot_provider::ToolCall;
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;

/// Echoes its single required argument back
struct EchoTool;

#[async_trait]
impl ToolTrait for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Echo the text argument"
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }
    async fn execute(&self, args: Value) -> ToolResult {
        args["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ToolError::new(ToolErrorKind::InvalidArguments, "text must be a string"))
    }
}

#[test]
fn test_registry_new_is_empty() {
    let registry = ToolRegistry::new();
    assert!(registry.names().is_empty());
    assert!(registry.definitions().is_empty());

    let registry: ToolRegistry = Default::default();
    assert!(registry.names().is_empty());
}

#[test]
fn test_registry_register_and_get() {
    let mut registry = ToolRegistry::new();
    registry.register(ReadFileTool::new(PathBuf::from("/tmp"), 100));

    assert!(registry.has("get_file_content"));
    assert!(!registry.has("read_file"));
    assert_eq!(
        registry.get("get_file_content").map(|t| t.name()),
        Some("get_file_content")
    );
    assert!(registry.get("nonexistent").is_none());
}

#[test]
fn test_registry_register_replaces_same_name() {
    let mut registry = ToolRegistry::new();
    registry.register(ListFilesTool::new(PathBuf::from("/tmp/a")));
    registry.register(ListFilesTool::new(PathBuf::from("/tmp/b")));
    assert_eq!(registry.names(), vec!["get_files_info".to_string()]);
}

#[test]
fn test_default_tools_advertises_four_sorted_schemas() {
    let registry = default_tools(&PathBuf::from("/tmp"), &ToolSettings::default());

    assert_eq!(
        registry.names(),
        vec![
            "get_file_content".to_string(),
            "get_files_info".to_string(),
            "run_python_file".to_string(),
            "write_file".to_string(),
        ]
    );

    let definitions = registry.definitions();
    assert_eq!(definitions.len(), 4);
    for def in &definitions {
        assert_eq!(def.function.parameters["type"], "object");
        assert!(!def.function.description.is_empty());
    }
    let write = definitions
        .iter()
        .find(|d| d.function.name == "write_file")
        .unwrap();
    assert_eq!(write.function.parameters["required"], json!(["file_path", "content"]));
}

#[test]
fn test_to_provider_tool() {
    let tool = to_provider_tool(&EchoTool);
    assert_eq!(tool.function.name, "echo");
    assert_eq!(tool.function.description, "Echo the text argument");
}

#[tokio::test]
async fn test_execute_unknown_tool() {
    let registry = ToolRegistry::new();
    let err = registry.execute("nonexistent", json!({})).await.unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::UnknownTool);
    assert_eq!(render(Err(err)), "Error: Unknown function 'nonexistent'");
}

#[tokio::test]
async fn test_execute_missing_required_argument() {
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);

    let err = registry.execute("echo", json!({})).await.unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::InvalidArguments);
    assert_eq!(
        err.to_string(),
        "Missing required argument 'text' for function 'echo'"
    );
}

#[tokio::test]
async fn test_execute_non_object_arguments() {
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);

    let err = registry.execute("echo", json!(["hi"])).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Arguments for function 'echo' must be an object"
    );
}

#[tokio::test]
async fn test_execute_null_arguments_treated_as_empty() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "abc").unwrap();
    let mut registry = ToolRegistry::new();
    registry.register(ListFilesTool::new(dir.path().to_path_buf()));

    let output = registry.execute("get_files_info", Value::Null).await.unwrap();
    assert_eq!(output, "- a.txt: file_size=3 bytes, is_dir=false");
}

#[tokio::test]
async fn test_dispatch_renders_success_and_failure() {
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);

    let ok = registry
        .dispatch(&ToolCall::new("call_0", "echo", json!({"text": "hello"})))
        .await;
    assert_eq!(ok, "hello");

    let failed = registry
        .dispatch(&ToolCall::new("call_1", "echo", json!({"text": 42})))
        .await;
    assert_eq!(failed, "Error: text must be a string");
}
