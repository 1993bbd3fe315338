//! OpenAI-compatible chat-completions client
//!
//! Works against any endpoint speaking the `/chat/completions` dialect
//! (DeepSeek, OpenAI, OpenRouter, vLLM).

use crate::*;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, trace};

pub const DEFAULT_API_BASE: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// OpenAI-compatible inference client
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        let api_base = api_base
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
            default_model: default_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    fn build_request(&self, params: &ChatParams) -> serde_json::Value {
        let model = if params.model.is_empty() {
            self.default_model.clone()
        } else {
            params.model.clone()
        };

        let messages: Vec<serde_json::Value> = params
            .messages
            .iter()
            .map(|m| {
                let mut obj = json!({ "role": &m.role });
                if let Some(content) = &m.content {
                    obj["content"] = json!(content);
                }
                if let Some(tool_calls) = &m.tool_calls {
                    // The wire format wants arguments as a JSON-encoded string
                    let calls: Vec<serde_json::Value> = tool_calls
                        .iter()
                        .map(|c| {
                            json!({
                                "id": &c.id,
                                "type": &c.call_type,
                                "function": {
                                    "name": &c.function.name,
                                    "arguments": c.function.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                    obj["tool_calls"] = json!(calls);
                }
                if let Some(tool_call_id) = &m.tool_call_id {
                    obj["tool_call_id"] = json!(tool_call_id);
                }
                if let Some(name) = &m.name {
                    obj["name"] = json!(name);
                }
                obj
            })
            .collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        if !params.tools.is_empty() {
            let tools: Vec<serde_json::Value> = params
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": &t.function.name,
                            "description": &t.function.description,
                            "parameters": &t.function.parameters
                        }
                    })
                })
                .collect();

            body["tools"] = json!(tools);
            body["tool_choice"] = match &params.tool_choice {
                ToolChoice::Auto => json!("auto"),
                ToolChoice::Required(name) => {
                    json!({"type": "function", "function": {"name": name}})
                }
                ToolChoice::None => json!("none"),
            };
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let choice = json["choices"]
            .get(0)
            .ok_or(ProviderError::InvalidResponse)?;
        let message = &choice["message"];
        let content = message["content"].as_str().map(|s| s.to_string());
        let finish_reason = choice["finish_reason"]
            .as_str()
            .unwrap_or("stop")
            .to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let function = &call["function"];
                // Undecodable argument strings are kept verbatim so the caller
                // can report them back to the model
                let args = function["arguments"]
                    .as_str()
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or_else(|| function["arguments"].clone());

                tool_calls.push(ToolCall {
                    id: call["id"].as_str().unwrap_or("").to_string(),
                    name: function["name"].as_str().unwrap_or("").to_string(),
                    arguments: args,
                });
            }
        }

        let usage = if let Some(usage) = json["usage"].as_object() {
            let field = |k: &str| usage.get(k).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            Usage {
                prompt_tokens: field("prompt_tokens"),
                completion_tokens: field("completion_tokens"),
                total_tokens: field("total_tokens"),
            }
        } else {
            Usage::default()
        };

        Ok(ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage,
        })
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        let url = format!("{}/chat/completions", self.api_base);
        trace!("POST {}", url);
        let body = self.build_request(&params);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }
            let error = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(String::from))
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(ProviderError::Api(error));
        }

        let json: serde_json::Value = serde_json::from_str(&text)?;
        let response = self.parse_response(json)?;
        debug!(
            "chat completion: {} tool calls, finish_reason={}",
            response.tool_calls.len(),
            response.finish_reason
        );
        Ok(response)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_uses_defaults() {
        let provider = OpenAiProvider::new("sk-test", None, None);
        assert_eq!(provider.api_base, DEFAULT_API_BASE);
        assert_eq!(provider.default_model, DEFAULT_MODEL);
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let provider =
            OpenAiProvider::new("sk-test", Some("https://api.openai.com/v1/".to_string()), None);
        assert_eq!(provider.api_base, "https://api.openai.com/v1");
    }

    #[test]
    fn test_new_ignores_empty_base() {
        let provider = OpenAiProvider::new("sk-test", Some(String::new()), None);
        assert_eq!(provider.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_is_configured() {
        assert!(OpenAiProvider::new("key", None, None).is_configured());
        assert!(!OpenAiProvider::new("", None, None).is_configured());
    }

    #[test]
    fn test_build_request_falls_back_to_default_model() {
        let provider = OpenAiProvider::new("sk-test", None, Some("custom-model".to_string()));
        let request = provider.build_request(&ChatParams {
            messages: vec![Message::user("Hello")],
            ..ChatParams::default()
        });
        assert_eq!(request["model"], "custom-model");
        assert!(request.get("tools").is_none());
        assert!(request.get("tool_choice").is_none());
    }

    #[test]
    fn test_build_request_required_tool_choice() {
        let provider = OpenAiProvider::new("sk-test", None, None);
        let params = ChatParams {
            model: "deepseek-chat".to_string(),
            messages: vec![Message::user("plan this")],
            tools: vec![Tool::new("act", "Decide", json!({"type": "object"}))],
            tool_choice: ToolChoice::Required("act".to_string()),
            ..ChatParams::default()
        };

        let request = provider.build_request(&params);
        assert_eq!(request["tools"][0]["function"]["name"], "act");
        assert_eq!(request["tool_choice"]["type"], "function");
        assert_eq!(request["tool_choice"]["function"]["name"], "act");
    }

    #[test]
    fn test_build_request_encodes_tool_call_arguments_as_string() {
        let provider = OpenAiProvider::new("sk-test", None, None);
        let mut assistant = Message::assistant("");
        assistant.tool_calls = Some(vec![ToolCallDef::new(
            "call_1",
            "list_files",
            json!({"directory": "."}),
        )]);
        let params = ChatParams {
            messages: vec![
                assistant,
                Message::tool("call_1", "list_files", "DIR .: a.txt"),
            ],
            ..ChatParams::default()
        };

        let request = provider.build_request(&params);
        let messages = request["messages"].as_array().unwrap();
        let args = messages[0]["tool_calls"][0]["function"]["arguments"]
            .as_str()
            .unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(args).unwrap(),
            json!({"directory": "."})
        );
        assert_eq!(messages[1]["role"], "tool");
        assert_eq!(messages[1]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_parse_response_simple() {
        let provider = OpenAiProvider::new("sk-test", None, None);
        let response = provider
            .parse_response(json!({
                "choices": [{
                    "message": {"content": "Hello!", "role": "assistant"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
            }))
            .unwrap();

        assert_eq!(response.content.as_deref(), Some("Hello!"));
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.usage.total_tokens, 15);
    }

    #[test]
    fn test_parse_response_multiple_tool_calls_in_order() {
        let provider = OpenAiProvider::new("sk-test", None, None);
        let response = provider
            .parse_response(json!({
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [
                            {"id": "call_1", "function": {"name": "list_files", "arguments": "{\"directory\": \".\"}"}},
                            {"id": "call_2", "function": {"name": "read_file", "arguments": "{\"filename\": \"a.txt\"}"}}
                        ]
                    },
                    "finish_reason": "tool_calls"
                }]
            }))
            .unwrap();

        assert_eq!(response.content, None);
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].name, "list_files");
        assert_eq!(response.tool_calls[1].arguments, json!({"filename": "a.txt"}));
        assert_eq!(response.usage.total_tokens, 0);
    }

    #[test]
    fn test_parse_response_keeps_undecodable_arguments() {
        let provider = OpenAiProvider::new("sk-test", None, None);
        let response = provider
            .parse_response(json!({
                "choices": [{
                    "message": {
                        "tool_calls": [{"id": "call_1", "function": {"name": "read_file", "arguments": "{not json"}}]
                    },
                    "finish_reason": "tool_calls"
                }]
            }))
            .unwrap();

        assert_eq!(response.tool_calls[0].arguments, json!("{not json"));
    }

    #[test]
    fn test_parse_response_missing_choices() {
        let provider = OpenAiProvider::new("sk-test", None, None);
        let result = provider.parse_response(json!({"choices": []}));
        assert!(matches!(result, Err(ProviderError::InvalidResponse)));
    }

    #[tokio::test]
    async fn test_chat_without_key_fails_fast() {
        let provider = OpenAiProvider::new("", None, None);
        let result = provider.chat(ChatParams::default()).await;
        assert!(matches!(result, Err(ProviderError::NoApiKey)));
    }
}
