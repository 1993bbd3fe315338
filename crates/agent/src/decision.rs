//! Structured decisions from the model
//!
//! The model is offered a single `act` function and forced to call it. Its
//! arguments carry either a final answer or a list of steps.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use stepwise_provider::{ChatParams, Message, Provider, Tool, ToolChoice};

use crate::{AgentError, AgentSettings, Result};

pub const DECISION_FUNCTION: &str = "act";

/// What the planner or replanner decided
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    FinalAnswer(String),
    StepPlan(Vec<String>),
}

/// Function definition the model must call
pub fn decision_tool() -> Tool {
    Tool::new(
        DECISION_FUNCTION,
        "Action to perform. To answer the user directly, set `response`. \
         If tools are needed to get the answer, set `steps` instead.",
        json!({
            "type": "object",
            "properties": {
                "response": {
                    "type": "string",
                    "description": "Final answer to the user"
                },
                "steps": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Steps to follow, in order"
                }
            }
        }),
    )
}

/// Interpret `act` arguments as exactly one decision
pub fn parse_decision(arguments: &Value) -> Result<Decision> {
    let decoded;
    let mut args = arguments;
    if let Value::String(raw) = arguments {
        decoded = serde_json::from_str::<Value>(raw).map_err(|e| {
            AgentError::DecisionAdapter(format!("arguments are not valid JSON: {}", e))
        })?;
        args = &decoded;
    }
    // Accept the nested `{"action": {...}}` shape as well
    let args = args.get("action").filter(|a| a.is_object()).unwrap_or(args);

    if !args.is_object() {
        return Err(AgentError::DecisionAdapter(format!(
            "expected an object, got: {}",
            args
        )));
    }

    let response = match args.get("response") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(other) => {
            return Err(AgentError::DecisionAdapter(format!(
                "response must be a string, got: {}",
                other
            )))
        }
    };

    let steps = match args.get("steps") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => {
            let mut steps = Vec::with_capacity(items.len());
            for item in items {
                let step = item.as_str().ok_or_else(|| {
                    AgentError::DecisionAdapter(format!("step must be a string, got: {}", item))
                })?;
                if !step.trim().is_empty() {
                    steps.push(step.trim().to_string());
                }
            }
            Some(steps)
        }
        Some(other) => {
            return Err(AgentError::DecisionAdapter(format!(
                "steps must be an array, got: {}",
                other
            )))
        }
    };

    match (response, steps) {
        (Some(_), Some(steps)) if !steps.is_empty() => Err(AgentError::DecisionAdapter(
            "both a response and steps were given".to_string(),
        )),
        (Some(response), _) if !response.is_empty() => Ok(Decision::FinalAnswer(response)),
        (_, Some(steps)) if !steps.is_empty() => Ok(Decision::StepPlan(steps)),
        (_, Some(_)) => Err(AgentError::DecisionAdapter("plan has no steps".to_string())),
        _ => Err(AgentError::DecisionAdapter(
            "neither a response nor steps were given".to_string(),
        )),
    }
}

/// Forces a structured decision out of the provider
pub struct DecisionAdapter<P: Provider> {
    provider: Arc<P>,
    settings: AgentSettings,
}

impl<P: Provider> DecisionAdapter<P> {
    pub fn new(provider: Arc<P>, settings: AgentSettings) -> Self {
        Self { provider, settings }
    }

    pub async fn decide(&self, messages: Vec<Message>) -> Result<Decision> {
        let params = ChatParams {
            model: self.settings.model.clone(),
            messages,
            tools: vec![decision_tool()],
            tool_choice: ToolChoice::Required(DECISION_FUNCTION.to_string()),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let response = self.provider.chat(params).await?;
        let call = response
            .tool_calls
            .iter()
            .find(|c| c.name == DECISION_FUNCTION)
            .ok_or_else(|| {
                AgentError::DecisionAdapter(format!(
                    "model did not call `{}` (finish_reason={})",
                    DECISION_FUNCTION, response.finish_reason
                ))
            })?;

        let decision = parse_decision(&call.arguments)?;
        debug!("decision: {:?}", decision);
        Ok(decision)
    }
}
