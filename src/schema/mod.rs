//! Schema subsystem
//!
//! Object types are declarative: each one is an ordered list of field rules
//! loaded once at startup and read-only afterwards.
//!
//! # Design Principles
//!
//! - One typed variant per value type, no dispatch on type strings
//! - Defaults checked against their own rule at registration
//! - Field validation is pure and deterministic

mod errors;
mod registry;
mod types;
mod validator;

pub use errors::{FieldRejection, RejectionKind, RejectionList, SchemaError, SchemaResult, Severity};
pub use registry::SchemaRegistry;
pub use types::{FieldDefault, FieldKind, FieldRule, ObjectType, TaskEvent, TaskRule, NOW_DEFAULT};
pub use validator::{json_type_name, FieldContext, FieldValidator, OperationKind, Validated};
