//! Materialization errors
//!
//! Per-field failures are aggregated into a single `Rejected` variant;
//! everything else short-circuits the request.

use thiserror::Error;

use crate::schema::{RejectionList, SchemaError};
use crate::version::{AdvanceError, VersionConflict};

/// Result type for materialization
pub type MaterializeResult<T> = Result<T, MaterializeError>;

/// Why a payload could not be materialized
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MaterializeError {
    #[error("Unknown object type: {0}")]
    UnknownObjectType(String),

    #[error("Payload rejected: {0}")]
    Rejected(RejectionList),

    #[error(transparent)]
    VersionConflict(#[from] VersionConflict),

    #[error("Stored version {0} cannot be advanced")]
    VersionExhausted(u64),

    #[error("Existing object has type '{actual}', expected '{expected}'")]
    ObjectTypeMismatch { expected: String, actual: String },

    #[error("Payload has {fields} fields, limit is {limit}")]
    PayloadTooLarge { fields: usize, limit: usize },
}

impl MaterializeError {
    /// Get error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            MaterializeError::UnknownObjectType(_) => "OV_UNKNOWN_OBJECT_TYPE",
            MaterializeError::Rejected(_) => "OV_VALIDATION_FAILED",
            MaterializeError::VersionConflict(_) => "OV_VERSION_CONFLICT",
            MaterializeError::VersionExhausted(_) => "OV_VERSION_EXHAUSTED",
            MaterializeError::ObjectTypeMismatch { .. } => "OV_OBJECT_TYPE_MISMATCH",
            MaterializeError::PayloadTooLarge { .. } => "OV_PAYLOAD_TOO_LARGE",
        }
    }

    /// HTTP status code for a collaborator that serves the engine over HTTP
    pub fn status_code(&self) -> u16 {
        match self {
            MaterializeError::UnknownObjectType(_) => 404,
            MaterializeError::Rejected(_) => 400,
            MaterializeError::VersionConflict(_) => 409,
            MaterializeError::VersionExhausted(_) => 500,
            MaterializeError::ObjectTypeMismatch { .. } => 400,
            MaterializeError::PayloadTooLarge { .. } => 413,
        }
    }

    /// The aggregated rejections, if this is a validation failure
    pub fn rejections(&self) -> Option<&RejectionList> {
        match self {
            MaterializeError::Rejected(list) => Some(list),
            _ => None,
        }
    }
}

impl From<AdvanceError> for MaterializeError {
    fn from(err: AdvanceError) -> Self {
        match err {
            AdvanceError::Conflict(conflict) => MaterializeError::VersionConflict(conflict),
            AdvanceError::Exhausted(version) => MaterializeError::VersionExhausted(version),
        }
    }
}

impl From<SchemaError> for MaterializeError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::UnknownObjectType(name) => MaterializeError::UnknownObjectType(name),
            other => MaterializeError::UnknownObjectType(other.to_string()),
        }
    }
}
