//! File system tools: list, read and write inside the working directory

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;

use tracing::debug;

use super::path_guard::resolve_in_workspace;
use super::{parse_args, ToolError, ToolErrorKind, ToolResult, ToolTrait};

fn outside(action: &str, path: &str) -> ToolError {
    ToolError::new(
        ToolErrorKind::OutsideWorkspace,
        format!(
            "Cannot {} \"{}\" as it is outside the permitted working directory",
            action, path
        ),
    )
}

/// Directory listing tool
pub struct ListFilesTool {
    workspace: PathBuf,
}

impl ListFilesTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }

    /// One line per immediate entry, in directory enumeration order
    pub async fn list(&self, directory: &str) -> ToolResult {
        let path = resolve_in_workspace(&self.workspace, directory)
            .await
            .ok_or_else(|| outside("list", directory))?;

        debug!("Listing {:?}", path);
        let is_dir = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(ToolError::new(
                ToolErrorKind::WrongType,
                format!("\"{}\" is not a directory", directory),
            ));
        }

        let mut entries = tokio::fs::read_dir(&path).await.map_err(ToolError::io)?;
        let mut lines = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(ToolError::io)? {
            let name = entry.file_name().to_string_lossy().to_string();
            let line = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) => format!(
                    "- {}: file_size={} bytes, is_dir={}",
                    name,
                    meta.len(),
                    meta.is_dir()
                ),
                Err(e) => format!("- {}: Error: {}", name, e),
            };
            lines.push(line);
        }
        Ok(lines.join("\n"))
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
        "get_files_info"
    }
    fn description(&self) -> &str {
        "Lists files in the specified directory along with their sizes, constrained to the working directory."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "The directory to list files from, relative to the working directory. If not provided, lists files in the working directory itself."
                }
            }
        })
    }
    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let args: ListFilesArgs = parse_args(self.name(), args)?;
        self.list(&args.directory).await
    }
}

/// File content tool
pub struct ReadFileTool {
    workspace: PathBuf,
    max_chars: usize,
}

impl ReadFileTool {
    pub fn new(workspace: PathBuf, max_chars: usize) -> Self {
        Self {
            workspace,
            max_chars,
        }
    }

    /// Read a regular file as text, truncated to `max_chars` characters
    pub async fn read(&self, file_path: &str) -> ToolResult {
        let path = resolve_in_workspace(&self.workspace, file_path)
            .await
            .ok_or_else(|| outside("read", file_path))?;

        debug!("Reading {:?}", path);
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(ToolError::new(
                ToolErrorKind::NotFound,
                format!("File not found or is not a regular file: \"{}\"", file_path),
            ));
        }

        let bytes = tokio::fs::read(&path).await.map_err(ToolError::io)?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        Ok(truncate_chars(content, self.max_chars, file_path))
    }
}

/// Keep the first `max_chars` characters and append a marker when cut
pub fn truncate_chars(content: String, max_chars: usize, file_path: &str) -> String {
    match content.char_indices().nth(max_chars) {
        Some((boundary, _)) => {
            debug!("Truncating {} at {} characters", file_path, max_chars);
            let mut truncated = content[..boundary].to_string();
            truncated.push_str(&format!(
                "\n[...File \"{}\" truncated at {} characters]",
                file_path, max_chars
            ));
            truncated
        }
        None => content,
    }
}

#[derive(Deserialize)]
struct ReadFileArgs {
    file_path: String,
}

#[async_trait]
impl ToolTrait for ReadFileTool {
    fn name(&self) -> &str {
        "get_file_content"
    }
    fn description(&self) -> &str {
        "Reads the contents of a file (truncated if too large) within the working directory."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The path to the file, relative to the working directory."
                }
            },
            "required": ["file_path"]
        })
    }
    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let args: ReadFileArgs = parse_args(self.name(), args)?;
        self.read(&args.file_path).await
    }
}

/// File writing tool
pub struct WriteFileTool {
    workspace: PathBuf,
}

impl WriteFileTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }

    /// Create or overwrite a file, creating parent directories as needed
    pub async fn write(&self, file_path: &str, content: &str) -> ToolResult {
        let path = resolve_in_workspace(&self.workspace, file_path)
            .await
            .ok_or_else(|| outside("write to", file_path))?;

        debug!("Writing {:?}", path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ToolError::io)?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(ToolError::io)?;

        Ok(format!(
            "Successfully wrote to \"{}\" ({} characters written)",
            file_path,
            content.chars().count()
        ))
    }
}

#[derive(Deserialize)]
struct WriteFileArgs {
    file_path: String,
    content: String,
}

#[async_trait]
impl ToolTrait for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }
    fn description(&self) -> &str {
        "Creates or overwrites a file with the given content, constrained to the working directory."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Relative path of the file to write."
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file."
                }
            },
            "required": ["file_path", "content"]
        })
    }
    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let args: WriteFileArgs = parse_args(self.name(), args)?;
        self.write(&args.file_path, &args.content).await
    }
}
