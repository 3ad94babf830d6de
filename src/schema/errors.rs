//! Schema error types
//!
//! Registry errors:
//! - OV_DUPLICATE_SCHEMA (FATAL)
//! - OV_INVALID_SCHEMA (FATAL)
//! - OV_MALFORMED_SCHEMA_FILE (FATAL)
//! - OV_SCHEMA_IMMUTABLE (REJECT)
//! - OV_UNKNOWN_OBJECT_TYPE (REJECT)
//!
//! Per-field rejections are values, not errors: they are collected into a
//! [`RejectionList`] and reported together.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Severity levels for schema errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Request rejected
    Reject,
    /// Misconfiguration; the process must not serve
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Registry-level schema errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Object type registered twice
    #[error("Object type '{0}' is already registered")]
    DuplicateSchema(String),

    /// Object type not registered
    #[error("Object type '{0}' is not registered")]
    UnknownObjectType(String),

    /// Object type violates its own structural rules
    #[error("Invalid schema for '{object_type}': {reason}")]
    InvalidSchema { object_type: String, reason: String },

    /// Schema file could not be read or parsed
    #[error("Malformed schema file '{path}': {reason}")]
    MalformedFile { path: String, reason: String },

    /// Attempt to overwrite a saved schema
    #[error("Schema for '{0}' already exists and is immutable")]
    Immutable(String),
}

impl SchemaError {
    pub fn invalid(object_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            object_type: object_type.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateSchema(_) => "OV_DUPLICATE_SCHEMA",
            Self::UnknownObjectType(_) => "OV_UNKNOWN_OBJECT_TYPE",
            Self::InvalidSchema { .. } => "OV_INVALID_SCHEMA",
            Self::MalformedFile { .. } => "OV_MALFORMED_SCHEMA_FILE",
            Self::Immutable(_) => "OV_SCHEMA_IMMUTABLE",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnknownObjectType(_) | Self::Immutable(_) => Severity::Reject,
            _ => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Why a single field was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
    MissingRequiredField,
    NullNotAllowed,
    TypeMismatch,
    ValueNotAllowed,
    InsufficientRole,
    UnknownField,
}

impl RejectionKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::NullNotAllowed => "NULL_NOT_ALLOWED",
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::ValueNotAllowed => "VALUE_NOT_ALLOWED",
            Self::InsufficientRole => "INSUFFICIENT_ROLE",
            Self::UnknownField => "UNKNOWN_FIELD",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRejection {
    /// Field name (`$root` for the payload itself)
    pub field: String,
    /// Rejection category
    pub kind: RejectionKind,
    /// Expected type or condition
    pub expected: String,
    /// Actual value or type found
    pub actual: String,
}

impl FieldRejection {
    pub fn new(
        field: impl Into<String>,
        kind: RejectionKind,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            kind,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(
            field,
            RejectionKind::MissingRequiredField,
            "field to be present",
            "missing",
        )
    }

    pub fn null_value(field: impl Into<String>) -> Self {
        Self::new(field, RejectionKind::NullNotAllowed, "non-null value", "null")
    }

    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::new(field, RejectionKind::TypeMismatch, expected, actual)
    }

    pub fn not_allowed(
        field: impl Into<String>,
        allowed: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::new(field, RejectionKind::ValueNotAllowed, allowed, actual)
    }

    pub fn insufficient_role(field: impl Into<String>, roles: impl Into<String>) -> Self {
        Self::new(
            field,
            RejectionKind::InsufficientRole,
            roles,
            "caller holds none of the roles",
        )
    }

    pub fn unknown_field(field: impl Into<String>) -> Self {
        Self::new(
            field,
            RejectionKind::UnknownField,
            "no undeclared fields",
            "extra field present",
        )
    }
}

impl fmt::Display for FieldRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}' [{}]: expected {}, got {}",
            self.field, self.kind, self.expected, self.actual
        )
    }
}

/// Every field rejection for one request, in schema order.
///
/// Serializes as a JSON array so it can be returned as an error body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RejectionList(Vec<FieldRejection>);

impl RejectionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rejection: FieldRejection) {
        self.0.push(rejection);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldRejection> {
        self.0.iter()
    }

    /// Rejections for one field
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldRejection> + 'a {
        self.0.iter().filter(move |r| r.field == field)
    }

    /// Returns true if any rejection of `kind` was recorded for `field`
    pub fn contains(&self, field: &str, kind: RejectionKind) -> bool {
        self.for_field(field).any(|r| r.kind == kind)
    }
}

impl From<Vec<FieldRejection>> for RejectionList {
    fn from(rejections: Vec<FieldRejection>) -> Self {
        Self(rejections)
    }
}

impl IntoIterator for RejectionList {
    type Item = FieldRejection;
    type IntoIter = std::vec::IntoIter<FieldRejection>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for RejectionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rejection) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", rejection)?;
        }
        Ok(())
    }
}
