//! Conversation state and checkpointing
//!
//! A thread's `ConversationState` is saved after every node of the control
//! loop, so a later process can pick the turn up where it stopped.

use thiserror::Error;

pub mod checkpoint;
pub mod state;

pub use checkpoint::{Checkpointer, FileCheckpointer, MemoryCheckpointer};
pub use state::{ConversationState, Node, StateUpdate};

/// Checkpoint store errors
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt checkpoint: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CheckpointError>;
