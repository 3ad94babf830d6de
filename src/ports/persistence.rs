//! Persistence port
//!
//! The store owns atomicity: `put` must check its `WriteCondition` and apply
//! the write as one compare-and-set. The engine never locks and never
//! retries.

use thiserror::Error;

use crate::object::ManagedObject;
use crate::schema::ObjectType;
use crate::version::{VersionConflict, WriteCondition};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Object not found: {object_type}/{key}")]
    NotFound { object_type: String, key: String },

    #[error(transparent)]
    VersionConflict(#[from] VersionConflict),

    #[error("Object already exists: {object_type}/{key}")]
    DuplicateKey { object_type: String, key: String },

    #[error("Unique fields already taken: {}", fields.join(", "))]
    UniqueViolation { fields: Vec<String> },

    #[error("Invalid write: {0}")]
    InvalidWrite(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(object_type: impl Into<String>, key: impl Into<String>) -> Self {
        StoreError::NotFound {
            object_type: object_type.into(),
            key: key.into(),
        }
    }

    pub fn duplicate_key(object_type: impl Into<String>, key: impl Into<String>) -> Self {
        StoreError::DuplicateKey {
            object_type: object_type.into(),
            key: key.into(),
        }
    }

    /// Infrastructure failures are retried by the port, never by the engine
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Index hints derived from the object type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteHints {
    /// Fields a store may index for lookups
    pub indexed: Vec<String>,
    /// Fields whose values must be unique per object type
    pub unique: Vec<String>,
}

impl WriteHints {
    pub fn for_type(object_type: &ObjectType) -> Self {
        Self {
            indexed: object_type.indexed_fields(),
            unique: object_type.unique_fields(),
        }
    }
}

/// Storage for managed objects, keyed by `(object_type, key)`.
pub trait PersistencePort: Send + Sync {
    /// Read an object
    fn get(&self, object_type: &str, key: &str) -> StoreResult<ManagedObject>;

    /// Write an object if `condition` holds for the stored version
    fn put(
        &self,
        object: &ManagedObject,
        condition: WriteCondition,
        hints: &WriteHints,
    ) -> StoreResult<()>;

    /// Delete an object
    fn delete(&self, object_type: &str, key: &str) -> StoreResult<()>;
}
