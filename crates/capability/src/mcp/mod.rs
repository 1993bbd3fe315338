//! MCP capability provider and server

use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use stepwise_config::ServerConfig;

use crate::{CapabilityError, CapabilityProvider, Result, ToolDescriptor};

pub mod protocol;
pub mod server;
pub mod transport;

use protocol::{CallToolResult, ListToolsResult, PROTOCOL_VERSION};
pub use server::serve;
pub use transport::McpTransport;

/// Tools served by an MCP server
pub struct McpCapabilities {
    transport: McpTransport,
    server_name: Option<String>,
    _child: Option<Child>,
}

impl McpCapabilities {
    /// Launch the configured server and complete the handshake
    pub async fn spawn(config: &ServerConfig) -> Result<Self> {
        info!("starting MCP server: {} {:?}", config.command, config.args);

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CapabilityError::Transport(format!("cannot start {}: {}", config.command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CapabilityError::Transport("server stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CapabilityError::Transport("server stdout unavailable".to_string()))?;

        let mut caps = Self::from_streams(stdout, stdin).await?;
        caps._child = Some(child);
        Ok(caps)
    }

    /// Handshake over already-connected streams
    pub async fn from_streams<R, W>(reader: R, writer: W) -> Result<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let transport = McpTransport::new(reader, writer);

        let init = transport
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "stepwise",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                })),
            )
            .await?;
        transport.notify("notifications/initialized", None).await?;

        let server_name = init["serverInfo"]["name"].as_str().map(String::from);
        debug!(
            "MCP handshake done: server={:?} protocol={}",
            server_name, init["protocolVersion"]
        );

        Ok(Self {
            transport,
            server_name,
            _child: None,
        })
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn transport(&self) -> &McpTransport {
        &self.transport
    }
}

#[async_trait]
impl CapabilityProvider for McpCapabilities {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsResult =
                serde_json::from_value(self.transport.request("tools/list", params).await?)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let raw = self
            .transport
            .request(
                "tools/call",
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await?;
        let result: CallToolResult = serde_json::from_value(raw)?;
        let text = result.joined_text();

        if result.is_error {
            Err(CapabilityError::Fault(text))
        } else {
            Ok(text)
        }
    }
}
