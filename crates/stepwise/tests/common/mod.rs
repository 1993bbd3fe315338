//! Common test utilities for Stepwise integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

use stepwise_session::{ConversationState, Node, StateUpdate};

/// Isolated home directory for one test
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub data_dir: PathBuf,
    pub workspace_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let data_dir = temp_dir.path().join(".stepwise");
        let workspace_dir = data_dir.join("workspace");

        Ok(Self {
            temp_dir,
            data_dir,
            workspace_dir,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    pub fn thread_file(&self, id: &str) -> PathBuf {
        self.data_dir.join("threads").join(format!("{}.json", id))
    }

    /// Command with HOME pointed at the test environment and no key in scope
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_stepwise"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env_remove("STEPWISE_API_KEY");
        cmd.env_remove("DEEPSEEK_API_KEY");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Config with a key, a model and the default workspace
    pub fn create_config(&self) -> anyhow::Result<()> {
        let config = r#"{
  "agent": { "defaults": { "model": "test/model" } },
  "provider": { "api_key": "test-api-key" }
}"#;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::write(self.config_file(), config)?;
        Ok(())
    }

    /// Config with a key and an inference endpoint nothing listens on
    pub fn create_offline_config(&self) -> anyhow::Result<()> {
        let config = r#"{
  "provider": { "api_key": "k", "api_base": "http://127.0.0.1:9/v1" }
}"#;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::write(self.config_file(), config)?;
        Ok(())
    }

    /// Checkpoint a thread with one finished turn
    pub fn create_thread(&self, id: &str, question: &str, answer: &str) -> anyhow::Result<()> {
        let mut state = ConversationState::new(id);
        state.begin_turn(question);
        state.apply(StateUpdate::response(answer));
        state.finish();
        self.write_state(&state)
    }

    /// Checkpoint a thread stopped before its executor ran
    pub fn create_interrupted_thread(&self, id: &str, question: &str) -> anyhow::Result<()> {
        let mut state = ConversationState::new(id);
        state.begin_turn(question);
        state.apply(StateUpdate::plan(vec![
            "look around".to_string(),
            "report".to_string(),
        ]));
        state.next = Node::Executing;
        self.write_state(&state)
    }

    fn write_state(&self, state: &ConversationState) -> anyhow::Result<()> {
        let path = self.thread_file(&state.thread_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(state)?)?;
        Ok(())
    }
}
