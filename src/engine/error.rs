//! Engine Error Types
//!
//! One error type for every object service operation. Per-field rejections
//! stay aggregated in `Rejected`; everything else short-circuits.

use thiserror::Error;

use crate::object::MaterializeError;
use crate::ports::StoreError;
use crate::schema::RejectionList;
use crate::version::VersionConflict;

/// Engine result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Engine error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Object type not registered
    #[error("Unknown object type: {0}")]
    UnknownObjectType(String),

    /// One or more fields failed validation
    #[error("Payload rejected: {0}")]
    Rejected(RejectionList),

    /// Stale expected version
    #[error(transparent)]
    VersionConflict(VersionConflict),

    /// Create against an existing key
    #[error("Object already exists: {object_type}/{key}")]
    DuplicateKey { object_type: String, key: String },

    /// Another object holds a unique value
    #[error("Unique fields already taken: {}", fields.join(", "))]
    UniqueViolation { fields: Vec<String> },

    /// Object not found
    #[error("Object not found: {object_type}/{key}")]
    NotFound { object_type: String, key: String },

    /// Payload is not acceptable as a whole
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Store failed; retrying is the store's business
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownObjectType(_) => "OV_UNKNOWN_OBJECT_TYPE",
            Self::Rejected(_) => "OV_VALIDATION_FAILED",
            Self::VersionConflict(_) => "OV_VERSION_CONFLICT",
            Self::DuplicateKey { .. } => "OV_DUPLICATE_KEY",
            Self::UniqueViolation { .. } => "OV_UNIQUE_VIOLATION",
            Self::NotFound { .. } => "OV_NOT_FOUND",
            Self::InvalidPayload(_) => "OV_INVALID_PAYLOAD",
            Self::StoreUnavailable(_) => "OV_STORE_UNAVAILABLE",
            Self::Internal(_) => "OV_INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnknownObjectType(_) => 404,
            Self::Rejected(_) => 400,
            Self::VersionConflict(_) => 409,
            Self::DuplicateKey { .. } => 409,
            Self::UniqueViolation { .. } => 409,
            Self::NotFound { .. } => 404,
            Self::InvalidPayload(_) => 400,
            Self::StoreUnavailable(_) => 503,
            Self::Internal(_) => 500,
        }
    }

    /// Aggregated field rejections, if any
    pub fn rejections(&self) -> Option<&RejectionList> {
        match self {
            Self::Rejected(list) => Some(list),
            _ => None,
        }
    }
}

impl From<MaterializeError> for CoreError {
    fn from(e: MaterializeError) -> Self {
        match e {
            MaterializeError::UnknownObjectType(name) => Self::UnknownObjectType(name),
            MaterializeError::Rejected(list) => Self::Rejected(list),
            MaterializeError::VersionConflict(conflict) => Self::VersionConflict(conflict),
            other @ MaterializeError::VersionExhausted(_) => Self::internal(other.to_string()),
            other @ (MaterializeError::ObjectTypeMismatch { .. }
            | MaterializeError::PayloadTooLarge { .. }) => Self::InvalidPayload(other.to_string()),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { object_type, key } => Self::NotFound { object_type, key },
            StoreError::VersionConflict(conflict) => Self::VersionConflict(conflict),
            StoreError::DuplicateKey { object_type, key } => Self::DuplicateKey { object_type, key },
            StoreError::UniqueViolation { fields } => Self::UniqueViolation { fields },
            StoreError::InvalidWrite(msg) => Self::internal(msg),
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_keep_their_meaning() {
        let err: CoreError = StoreError::duplicate_key("user", "u1").into();
        assert_eq!(err.code(), "OV_DUPLICATE_KEY");
        assert_eq!(err.status_code(), 409);

        let err: CoreError = StoreError::UniqueViolation { fields: vec!["email".into()] }.into();
        assert_eq!(err.code(), "OV_UNIQUE_VIOLATION");

        let err: CoreError = StoreError::Unavailable("down".into()).into();
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn test_conflict_from_either_side() {
        let conflict = VersionConflict { expected: 1, actual: 2 };
        let from_store: CoreError = StoreError::VersionConflict(conflict).into();
        let from_materializer: CoreError = MaterializeError::VersionConflict(conflict).into();
        assert_eq!(from_store, from_materializer);
    }

    #[test]
    fn test_payload_errors() {
        let err: CoreError = MaterializeError::PayloadTooLarge { fields: 5, limit: 2 }.into();
        assert_eq!(err.code(), "OV_INVALID_PAYLOAD");
        assert!(err.rejections().is_none());
    }

    #[test]
    fn test_exhausted_version_is_internal() {
        let err: CoreError = MaterializeError::VersionExhausted(u64::MAX).into();
        assert_eq!(err.code(), "OV_INTERNAL_ERROR");
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains(&u64::MAX.to_string()));
    }
}
