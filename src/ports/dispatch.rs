//! Task dispatch port
//!
//! Best-effort boundary: a failed enqueue is reported, never undone, and
//! never rolls back the write that triggered it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::schema::TaskEvent;

/// Enqueue failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Failed to enqueue onto '{queue}': {reason}")]
    DispatchFailed { queue: String, reason: String },
}

impl DispatchError {
    pub fn failed(queue: impl Into<String>, reason: impl Into<String>) -> Self {
        DispatchError::DispatchFailed {
            queue: queue.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        "OV_DISPATCH_FAILED"
    }
}

/// Message metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub timestamp: DateTime<Utc>,
    /// Configured producer name
    pub source: String,
    pub object_type: String,
    pub event: TaskEvent,
    pub queue: String,
    pub key: String,
    pub version: u64,
}

/// Message put on a queue after a write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    /// The object as rendered for responses
    pub data: Value,
    pub metadata: TaskMetadata,
}

/// Queue sink for follow-up tasks
pub trait TaskDispatchPort: Send + Sync {
    fn enqueue(&self, queue: &str, envelope: &TaskEnvelope) -> Result<(), DispatchError>;
}
