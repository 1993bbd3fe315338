//! Capability providers
//!
//! A capability provider lists named, schema-described tools and invokes them
//! with JSON arguments. Two implementations ship here: the builtin tools run
//! in-process (`LocalCapabilities`) and any MCP server reached over a child
//! process's stdio (`McpCapabilities`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod builtin;
pub mod local;
pub mod mcp;
pub mod registry;

pub use local::{LocalCapabilities, ToolTrait};
pub use mcp::McpCapabilities;
pub use registry::CapabilityRegistry;

/// Capability errors
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("tool '{0}' not found")]
    NotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Fault(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CapabilityError>;

/// A callable tool as advertised by a capability provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema of the argument object
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub parameters: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Check `args` against the parameter schema and return the argument
    /// object to send. `null` is accepted as `{}` when nothing is required.
    ///
    /// Only the top level is checked: the value must be an object, every
    /// `required` property must be present, and properties with a declared
    /// primitive `type` must match it.
    pub fn normalize_arguments(&self, args: Value) -> Result<Value> {
        let args = match args {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        };

        let obj = args.as_object().ok_or_else(|| {
            CapabilityError::InvalidArguments(format!(
                "arguments for '{}' must be a JSON object, got: {}",
                self.name, args
            ))
        })?;

        if let Some(required) = self.parameters.get("required").and_then(|r| r.as_array()) {
            for key in required.iter().filter_map(|k| k.as_str()) {
                if !obj.contains_key(key) {
                    return Err(CapabilityError::InvalidArguments(format!(
                        "missing required argument '{}' for '{}'",
                        key, self.name
                    )));
                }
            }
        }

        if let Some(props) = self.parameters.get("properties").and_then(|p| p.as_object()) {
            for (key, value) in obj {
                let expected = props
                    .get(key)
                    .and_then(|p| p.get("type"))
                    .and_then(|t| t.as_str());
                if let Some(expected) = expected {
                    if !type_matches(expected, value) {
                        return Err(CapabilityError::InvalidArguments(format!(
                            "argument '{}' for '{}' should be of type {}",
                            key, self.name, expected
                        )));
                    }
                }
            }
        }

        Ok(args)
    }

    /// Function definition offered to the model
    pub fn to_provider_tool(&self) -> stepwise_provider::Tool {
        stepwise_provider::Tool::new(&self.name, &self.description, self.parameters.clone())
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

/// Source of callable tools
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Enumerate the available tools
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke a tool; the text result on success
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String>;
}
