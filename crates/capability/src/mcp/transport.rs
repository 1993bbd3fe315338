//! Request/response plumbing over a line-delimited byte stream
//!
//! A background task reads the stream and hands each response to the request
//! waiting on its id. A request that is dropped before its reply arrives
//! (for example by a timeout) deregisters itself, and a reply arriving later
//! is discarded.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::protocol::{RpcError, RpcMessage};
use crate::{CapabilityError, Result};

type Reply = std::result::Result<Value, RpcError>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub struct McpTransport {
    writer: AsyncMutex<BoxedWriter>,
    pending: PendingMap,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl McpTransport {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader = tokio::spawn(read_loop(reader, pending.clone()));

        Self {
            writer: AsyncMutex::new(Box::new(writer)),
            pending,
            next_id: AtomicU64::new(1),
            reader,
        }
    }

    /// Send a request and wait for its response
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        trace!("mcp -> #{} {}", id, method);
        self.send(&RpcMessage::request(id, method, params)).await?;

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(CapabilityError::JsonRpc {
                code: error.code,
                message: error.message,
            }),
            Err(_) => Err(CapabilityError::Transport(
                "connection closed before reply".to_string(),
            )),
        }
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        trace!("mcp -> {}", method);
        self.send(&RpcMessage::notification(method, params)).await
    }

    /// Requests still waiting for a reply
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    async fn send(&self, message: &RpcMessage) -> Result<()> {
        let line = message.to_line();
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| CapabilityError::Transport(format!("write failed: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| CapabilityError::Transport(format!("flush failed: {}", e)))?;
        Ok(())
    }
}

impl Drop for McpTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.id);
    }
}

fn lock(pending: &PendingMap) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Reply>>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn read_loop<R>(reader: R, pending: PendingMap)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("mcp stream closed");
                break;
            }
            Err(e) => {
                warn!("mcp read failed: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let value: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!("ignoring undecodable mcp line: {}", e);
                continue;
            }
        };

        match RpcMessage::from_value(value) {
            Ok(RpcMessage::Response { id, outcome }) => {
                let Some(id) = id.as_u64() else {
                    debug!("ignoring response with foreign id {}", id);
                    continue;
                };
                let waiter = lock(&pending).remove(&id);
                match waiter {
                    Some(tx) => {
                        trace!("mcp <- #{}", id);
                        let _ = tx.send(outcome);
                    }
                    None => debug!("discarding reply for abandoned request #{}", id),
                }
            }
            Ok(RpcMessage::Notification { method, .. }) => {
                debug!("ignoring server notification {}", method)
            }
            Ok(RpcMessage::Request { method, .. }) => {
                debug!("ignoring server request {}", method)
            }
            Err(e) => warn!("ignoring malformed mcp message: {}", e.message),
        }
    }

    // Waiters see a closed channel
    lock(&pending).clear();
}
