//! Model Context Protocol message shapes (JSON-RPC 2.0, newline-delimited)

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::ToolDescriptor;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// A decoded line of the stream
#[derive(Debug, Clone, PartialEq)]
pub enum RpcMessage {
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Response {
        id: Value,
        outcome: std::result::Result<Value, RpcError>,
    },
}

impl RpcMessage {
    pub fn request(id: impl Into<Value>, method: &str, params: Option<Value>) -> Self {
        RpcMessage::Request {
            id: id.into(),
            method: method.to_string(),
            params,
        }
    }

    pub fn notification(method: &str, params: Option<Value>) -> Self {
        RpcMessage::Notification {
            method: method.to_string(),
            params,
        }
    }

    pub fn result(id: Value, result: Value) -> Self {
        RpcMessage::Response {
            id,
            outcome: Ok(result),
        }
    }

    pub fn error(id: Value, error: RpcError) -> Self {
        RpcMessage::Response {
            id,
            outcome: Err(error),
        }
    }

    /// Classify a JSON value by the members it carries
    pub fn from_value(value: Value) -> std::result::Result<Self, RpcError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RpcError::new(INVALID_REQUEST, "message must be a JSON object"))?;

        let id = obj.get("id").cloned();
        let params = obj.get("params").cloned();

        if let Some(method) = obj.get("method") {
            let method = method
                .as_str()
                .ok_or_else(|| RpcError::new(INVALID_REQUEST, "method must be a string"))?
                .to_string();
            return Ok(match id {
                Some(id) => RpcMessage::Request { id, method, params },
                None => RpcMessage::Notification { method, params },
            });
        }

        let id = id.ok_or_else(|| RpcError::new(INVALID_REQUEST, "message has neither method nor id"))?;
        let outcome = match obj.get("error") {
            Some(err) => Err(serde_json::from_value(err.clone())
                .map_err(|e| RpcError::new(INVALID_REQUEST, format!("bad error object: {}", e)))?),
            None => Ok(obj.get("result").cloned().unwrap_or(Value::Null)),
        };
        Ok(RpcMessage::Response { id, outcome })
    }

    pub fn to_value(&self) -> Value {
        match self {
            RpcMessage::Request { id, method, params } => {
                let mut v = json!({"jsonrpc": JSONRPC_VERSION, "id": id, "method": method});
                if let Some(params) = params {
                    v["params"] = params.clone();
                }
                v
            }
            RpcMessage::Notification { method, params } => {
                let mut v = json!({"jsonrpc": JSONRPC_VERSION, "method": method});
                if let Some(params) = params {
                    v["params"] = params.clone();
                }
                v
            }
            RpcMessage::Response { id, outcome } => match outcome {
                Ok(result) => json!({"jsonrpc": JSONRPC_VERSION, "id": id, "result": result}),
                Err(error) => json!({"jsonrpc": JSONRPC_VERSION, "id": id, "error": error}),
            },
        }
    }

    /// Single-line wire encoding, newline terminated
    pub fn to_line(&self) -> String {
        let mut line = self.to_value().to_string();
        line.push('\n');
        line
    }
}

/// `tools/list` result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

/// `tools/call` result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub is_error: bool,
}

impl CallToolResult {
    pub fn text(text: impl Into<String>, is_error: bool) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error,
        }
    }

    /// Text blocks joined by newlines; other block kinds are skipped
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
