//! Plan / execute / replan agent
//!
//! A planner turns a request into a final answer or an ordered list of steps,
//! an executor carries out one step at a time with tools, and a replanner
//! decides after every step whether to continue, revise or answer.

use std::time::Duration;
use thiserror::Error;

use stepwise_capability::CapabilityError;
use stepwise_config::Config;
use stepwise_provider::ProviderError;
use stepwise_session::CheckpointError;

pub mod decision;
pub mod executor;
pub mod orchestrator;
pub mod planner;
pub mod prompts;
pub mod replanner;

pub use decision::{Decision, DecisionAdapter};
pub use executor::Executor;
pub use orchestrator::Orchestrator;
pub use planner::Planner;
pub use prompts::PromptTemplates;
pub use replanner::Replanner;

/// Agent errors; every variant aborts the current turn
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("decision adapter failure: {0}")]
    DecisionAdapter(String),

    #[error("inference error: {0}")]
    Provider(#[from] ProviderError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("turn exceeded {0} node executions")]
    RecursionLimit(u32),

    #[error("thread '{0}' has an unfinished turn; resume or abandon it first")]
    TurnInProgress(String),

    #[error("thread '{0}' has no unfinished turn")]
    NothingToResume(String),

    #[error("executor started with an empty plan")]
    EmptyPlan,
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// Loop parameters shared by every node
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub executor_max_iterations: u32,
    pub tool_timeout: Duration,
    pub recursion_limit: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.default_model(),
            max_tokens: config.agent.defaults.max_tokens,
            temperature: config.agent.defaults.temperature,
            executor_max_iterations: config.executor_max_iterations(),
            tool_timeout: config.tool_timeout(),
            recursion_limit: config.recursion_limit(),
        }
    }
}
