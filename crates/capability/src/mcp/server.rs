//! Serve a capability provider as an MCP server over a byte stream

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::protocol::{
    CallToolResult, RpcError, RpcMessage, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::{CapabilityError, CapabilityProvider, Result};

/// Answer requests until the input stream ends
///
/// Each request is handled on its own task so a slow tool does not hold up
/// the others; responses are written in completion order.
pub async fn serve<R, W>(caps: Arc<dyn CapabilityProvider>, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<RpcMessage>();

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(message) = rx.recv().await {
            writer.write_all(message.to_line().as_bytes()).await?;
            writer.flush().await?;
        }
        Ok::<(), std::io::Error>(())
    });

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let message = serde_json::from_str::<Value>(&line)
            .map_err(|e| RpcError::new(PARSE_ERROR, format!("parse error: {}", e)))
            .and_then(RpcMessage::from_value);

        match message {
            Ok(RpcMessage::Request { id, method, params }) => {
                let caps = caps.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let outcome = handle_request(caps.as_ref(), &method, params).await;
                    let _ = tx.send(RpcMessage::Response { id, outcome });
                });
            }
            Ok(RpcMessage::Notification { method, .. }) => debug!("notification {}", method),
            Ok(RpcMessage::Response { id, .. }) => debug!("ignoring unsolicited response {}", id),
            Err(error) => {
                warn!("bad message: {}", error.message);
                let _ = tx.send(RpcMessage::error(Value::Null, error));
            }
        }
    }

    info!("client closed the stream");
    drop(tx);
    writer_task
        .await
        .map_err(|e| CapabilityError::Transport(format!("writer task failed: {}", e)))??;
    Ok(())
}

async fn handle_request(
    caps: &dyn CapabilityProvider,
    method: &str,
    params: Option<Value>,
) -> std::result::Result<Value, RpcError> {
    match method {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": "stepwise",
                "version": env!("CARGO_PKG_VERSION")
            }
        })),
        "ping" => Ok(json!({})),
        "tools/list" => {
            let tools = caps
                .list_tools()
                .await
                .map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))?;
            Ok(json!({ "tools": tools }))
        }
        "tools/call" => {
            let params = params.unwrap_or(Value::Null);
            let name = params["name"]
                .as_str()
                .ok_or_else(|| RpcError::new(INVALID_PARAMS, "missing tool name"))?;
            let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
            info!("tools/call {}", name);

            let result = match caps.call_tool(name, arguments).await {
                Ok(text) => CallToolResult::text(text, false),
                Err(CapabilityError::NotFound(name)) => {
                    return Err(RpcError::new(
                        INVALID_PARAMS,
                        format!("unknown tool: {}", name),
                    ))
                }
                Err(e) => CallToolResult::text(e.to_string(), true),
            };
            serde_json::to_value(result).map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))
        }
        other => Err(RpcError::new(
            METHOD_NOT_FOUND,
            format!("method not found: {}", other),
        )),
    }
}
