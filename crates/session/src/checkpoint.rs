//! Checkpoint stores keyed by thread id

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::{ConversationState, Result};

/// Persists conversation state between node executions
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>>;
    async fn save(&self, state: &ConversationState) -> Result<()>;
    /// `true` if something was removed
    async fn delete(&self, thread_id: &str) -> Result<bool>;
    /// Known thread ids, sorted
    async fn list(&self) -> Result<Vec<String>>;
}

/// Process-local store
#[derive(Default)]
pub struct MemoryCheckpointer {
    states: Mutex<HashMap<String, ConversationState>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    fn states(&self) -> std::sync::MutexGuard<'_, HashMap<String, ConversationState>> {
        self.states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        Ok(self.states().get(thread_id).cloned())
    }

    async fn save(&self, state: &ConversationState) -> Result<()> {
        self.states()
            .insert(state.thread_id.clone(), state.clone());
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        Ok(self.states().remove(thread_id).is_some())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.states().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// One JSON document per thread in a directory
pub struct FileCheckpointer {
    dir: PathBuf,
}

impl FileCheckpointer {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn thread_path(&self, thread_id: &str) -> PathBuf {
        let safe = stepwise_config::paths::safe_filename(thread_id);
        self.dir.join(format!("{}.json", safe))
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        let path = self.thread_path(thread_id);
        if !path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let state: ConversationState = serde_json::from_str(&content)?;
        debug!("loaded thread {} ({})", thread_id, state.next);
        Ok(Some(state))
    }

    async fn save(&self, state: &ConversationState) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.thread_path(&state.thread_id);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("saved thread {} ({})", state.thread_id, state.next);
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        let path = self.thread_path(thread_id);
        if path.exists() {
            tokio::fs::remove_file(path).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        if !self.dir.exists() {
            return Ok(ids);
        }

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // File names are sanitized, so the id comes from the document
            let parsed = tokio::fs::read_to_string(&path)
                .await
                .map_err(crate::CheckpointError::from)
                .and_then(|c| {
                    serde_json::from_str::<ConversationState>(&c).map_err(Into::into)
                });
            match parsed {
                Ok(state) => ids.push(state.thread_id),
                Err(e) => warn!("skipping unreadable checkpoint {:?}: {}", path, e),
            }
        }

        ids.sort();
        Ok(ids)
    }
}
