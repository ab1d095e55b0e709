//! Agent core: sandboxed workspace tools and the bounded model loop.

use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod context;
pub mod loop_agent;
pub mod tools;

pub use context::ContextBuilder;
pub use loop_agent::{AgentLoop, LoopOutcome, LoopSettings, LoopStatus};
pub use tools::{ToolError, ToolErrorKind, ToolRegistry, ToolResult, ToolSettings, ToolTrait};

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("model call failed: {0}")]
    Provider(#[from] codepilot_provider::ProviderError),

    #[error("working directory is not a directory: {0}")]
    Workspace(PathBuf),
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// Absolute, normalized form of an existing working directory
pub async fn prepare_workspace(path: &Path) -> Result<PathBuf> {
    let root = tools::path_guard::absolute(path)
        .ok_or_else(|| AgentError::Workspace(path.to_path_buf()))?;
    match tokio::fs::metadata(&root).await {
        Ok(meta) if meta.is_dir() => Ok(root),
        _ => Err(AgentError::Workspace(root)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prepare_workspace_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("..").join(".");
        let root = prepare_workspace(&nested).await.unwrap();
        assert_eq!(root, dir.path());
    }

    #[tokio::test]
    async fn test_prepare_workspace_rejects_file_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.py");
        std::fs::write(&file, "print(1)").unwrap();

        assert!(matches!(
            prepare_workspace(&file).await,
            Err(AgentError::Workspace(_))
        ));
        assert!(matches!(
            prepare_workspace(&dir.path().join("missing")).await,
            Err(AgentError::Workspace(_))
        ));
    }
}
