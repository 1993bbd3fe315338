//! Shared fixtures: a mocked inference service and scripted tools

#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stepwise_agent::AgentSettings;
use stepwise_capability::{
    CapabilityError, CapabilityProvider, CapabilityRegistry, Result as CapResult, ToolDescriptor,
};
use stepwise_provider::{ChatParams, ChatResponse, Provider, ProviderError, ToolCall};

mock! {
    pub Provider {}

    #[async_trait]
    impl Provider for Provider {
        async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError>;
        fn default_model(&self) -> String;
        fn is_configured(&self) -> bool;
    }
}

/// Queue `responses` to be returned by consecutive chat calls
pub fn expect_responses(mock: &mut MockProvider, responses: Vec<ChatResponse>) {
    for response in responses {
        mock.expect_chat()
            .times(1)
            .return_once(move |_| Ok(response));
    }
}

/// `act` call carrying a final answer
pub fn act_answer(text: &str) -> ChatResponse {
    ChatResponse::tool_calls(vec![ToolCall {
        id: "call_act".to_string(),
        name: "act".to_string(),
        arguments: json!({ "response": text }),
    }])
}

/// `act` call carrying a plan
pub fn act_plan(steps: &[&str]) -> ChatResponse {
    ChatResponse::tool_calls(vec![ToolCall {
        id: "call_act".to_string(),
        name: "act".to_string(),
        arguments: json!({ "steps": steps }),
    }])
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

/// Model turn requesting the given tool calls
pub fn calls(list: Vec<ToolCall>) -> ChatResponse {
    ChatResponse::tool_calls(list)
}

/// Tools with predictable behavior
///
/// - `echo(text)` returns its text
/// - `sleepy` waits for `sleep` before answering and counts completions
/// - `broken` always faults
pub struct FakeCapabilities {
    pub sleep: Duration,
    pub completed_sleeps: Arc<AtomicUsize>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeCapabilities {
    pub fn new() -> Self {
        Self {
            sleep: Duration::from_secs(3600),
            completed_sleeps: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_sleep(sleep: Duration) -> Self {
        Self {
            sleep,
            ..Self::new()
        }
    }
}

#[async_trait]
impl CapabilityProvider for FakeCapabilities {
    async fn list_tools(&self) -> CapResult<Vec<ToolDescriptor>> {
        Ok(vec![
            ToolDescriptor::new(
                "echo",
                "Return the text argument",
                json!({
                    "type": "object",
                    "properties": {"text": {"type": "string"}},
                    "required": ["text"]
                }),
            ),
            ToolDescriptor::new(
                "sleepy",
                "Answers slowly",
                json!({"type": "object", "properties": {}}),
            ),
            ToolDescriptor::new(
                "broken",
                "Always fails",
                json!({"type": "object", "properties": {}}),
            ),
        ])
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> CapResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match name {
            "echo" => Ok(arguments["text"].as_str().unwrap_or_default().to_string()),
            "sleepy" => {
                tokio::time::sleep(self.sleep).await;
                self.completed_sleeps.fetch_add(1, Ordering::SeqCst);
                Ok("finally awake".to_string())
            }
            "broken" => Err(CapabilityError::Fault("disk on fire".to_string())),
            other => Err(CapabilityError::NotFound(other.to_string())),
        }
    }
}

pub async fn registry(caps: FakeCapabilities) -> CapabilityRegistry {
    CapabilityRegistry::discover(Arc::new(caps)).await.unwrap()
}

/// Defaults with a short tool deadline
pub fn settings() -> AgentSettings {
    AgentSettings {
        model: "test-model".to_string(),
        tool_timeout: Duration::from_millis(50),
        ..AgentSettings::default()
    }
}

/// Text of the last user message in a request
pub fn last_user_prompt(params: &ChatParams) -> String {
    params
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.text().to_string())
        .unwrap_or_default()
}
