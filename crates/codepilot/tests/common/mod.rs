//! Common test utilities for CodePilot integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// A `codepilot` command with no inherited API key
pub fn codepilot() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_codepilot"));
    cmd.env_remove("GEMINI_API_KEY").env_remove("RUST_LOG");
    cmd
}

/// Isolated data directory and working directory
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub home_dir: PathBuf,
    pub workspace_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let home_dir = temp_dir.path().join(".codepilot");
        let workspace_dir = temp_dir.path().join("workspace");
        std::fs::create_dir_all(&workspace_dir)?;

        Ok(Self {
            temp_dir,
            home_dir,
            workspace_dir,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.home_dir.join("config.json")
    }

    /// Write a config file pointing the provider at `api_base`
    pub fn write_config(&self, api_key: &str, api_base: Option<&str>) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.home_dir)?;
        let config = serde_json::json!({
            "provider": { "api_key": api_key, "api_base": api_base },
            "agent": { "working_dir": self.workspace_dir },
        });
        std::fs::write(self.config_file(), serde_json::to_string_pretty(&config)?)?;
        Ok(())
    }

    /// A command whose data directory is this environment's
    pub fn cmd(&self) -> Command {
        let mut cmd = codepilot();
        cmd.env("CODEPILOT_HOME", &self.home_dir);
        cmd
    }
}
