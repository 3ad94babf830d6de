//! ovcore - schema-driven object validation and versioning
//!
//! Payloads are validated against declarative object types, stamped with
//! system attributes, and written through ports under optimistic
//! concurrency.

pub mod cli;
pub mod config;
pub mod engine;
pub mod object;
pub mod observability;
pub mod ports;
pub mod schema;
pub mod version;
