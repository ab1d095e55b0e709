//! Workspace tools and the registry that dispatches model calls to them

pub mod filesystem;
pub mod path_guard;
pub mod python;

pub use filesystem::{ListFilesTool, ReadFileTool, WriteFileTool};
pub use python::RunPythonFileTool;

use async_trait::async_trait;
use codepilot_config::Config;
use codepilot_provider::{Tool, ToolCall};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// What went wrong inside a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    OutsideWorkspace,
    NotFound,
    WrongType,
    InvalidArguments,
    UnknownTool,
    Timeout,
    Io,
    Execution,
}

/// A failed tool call. The model only ever sees `Error: <message>`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn io(err: std::io::Error) -> Self {
        Self::new(ToolErrorKind::Io, err.to_string())
    }
}

pub type ToolResult = Result<String, ToolError>;

/// Render a tool result in the plain-text form sent to the model
pub fn render(result: ToolResult) -> String {
    match result {
        Ok(output) => output,
        Err(err) => format!("Error: {}", err),
    }
}

/// Deserialize tool arguments, reporting type mismatches as a tool error
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| {
        ToolError::new(
            ToolErrorKind::InvalidArguments,
            format!("Invalid arguments for function '{}': {}", tool, e),
        )
    })
}

type BoxedTool = Box<dyn ToolTrait + Send + Sync>;

#[async_trait]
pub trait ToolTrait: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value) -> ToolResult;
}

pub fn to_provider_tool(tool: &dyn ToolTrait) -> Tool {
    Tool::new(tool.name(), tool.description(), tool.parameters())
}

/// Limits and interpreter settings shared by the workspace tools
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub max_file_chars: usize,
    pub exec_timeout: Duration,
    pub interpreter: String,
    pub script_extension: String,
    pub script_language: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ToolSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_file_chars: config.tools.max_file_chars,
            exec_timeout: Duration::from_secs(config.tools.exec_timeout_secs),
            interpreter: config.tools.interpreter.clone(),
            script_extension: config.tools.script_extension.clone(),
            script_language: config.tools.script_language.clone(),
        }
    }
}

/// Name → tool mapping, built once and handed to the agent loop
pub struct ToolRegistry {
    tools: HashMap<String, BoxedTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register<T: ToolTrait + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&(dyn ToolTrait + Send + Sync)> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Schemas advertised to the model, sorted by name
    pub fn definitions(&self) -> Vec<Tool> {
        self.names()
            .iter()
            .filter_map(|name| self.get(name))
            .map(|tool| to_provider_tool(tool))
            .collect()
    }

    /// Look up, validate and run one call
    pub async fn execute(&self, name: &str, args: Value) -> ToolResult {
        let tool = self.tools.get(name).ok_or_else(|| {
            ToolError::new(
                ToolErrorKind::UnknownTool,
                format!("Unknown function '{}'", name),
            )
        })?;

        let args = match args {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        check_required(tool.as_ref(), &args)?;
        tool.execute(args).await
    }

    /// Run a model-requested call and render its result as text
    pub async fn dispatch(&self, call: &ToolCall) -> String {
        debug!("Dispatching {} ({})", call.name, call.id);
        render(self.execute(&call.name, call.arguments.clone()).await)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn check_required(tool: &(dyn ToolTrait + Send + Sync), args: &Value) -> Result<(), ToolError> {
    let object = args.as_object().ok_or_else(|| {
        ToolError::new(
            ToolErrorKind::InvalidArguments,
            format!("Arguments for function '{}' must be an object", tool.name()),
        )
    })?;

    let schema = tool.parameters();
    let required = schema["required"].as_array().cloned().unwrap_or_default();
    for key in required.iter().filter_map(|k| k.as_str()) {
        if !object.contains_key(key) {
            return Err(ToolError::new(
                ToolErrorKind::InvalidArguments,
                format!(
                    "Missing required argument '{}' for function '{}'",
                    key,
                    tool.name()
                ),
            ));
        }
    }
    Ok(())
}

/// The four workspace tools: list, read, write, execute
pub fn default_tools(workspace: &Path, settings: &ToolSettings) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ListFilesTool::new(workspace.to_path_buf()));
    registry.register(ReadFileTool::new(
        workspace.to_path_buf(),
        settings.max_file_chars,
    ));
    registry.register(WriteFileTool::new(workspace.to_path_buf()));
    registry.register(RunPythonFileTool::from_settings(
        workspace.to_path_buf(),
        settings,
    ));
    registry
}
