//! Engine configuration
//!
//! Loaded from a JSON file, validated once at startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::DEFAULT_SOURCE;
use crate::object::{ObjectMaterializer, UnknownFieldPolicy, DEFAULT_MAX_PAYLOAD_FIELDS};
use crate::schema::SchemaRegistry;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Invalid config JSON: {0}")]
    Malformed(String),

    #[error("Invalid config value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        "OV_CONFIG_ERROR"
    }

    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory of object-type schema files (required)
    pub schema_dir: PathBuf,

    /// Handling of undeclared payload keys (default "drop")
    #[serde(default)]
    pub unknown_fields: UnknownFieldPolicy,

    /// Producer name stamped into task envelopes (default "ovcore")
    #[serde(default = "default_source")]
    pub source: String,

    /// Tracing filter used when RUST_LOG is unset (default "info")
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Upper bound on payload keys (default 1024)
    #[serde(default = "default_max_payload_fields")]
    pub max_payload_fields: usize,
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}
fn default_log_filter() -> String {
    "info".to_string()
}
fn default_max_payload_fields() -> usize {
    DEFAULT_MAX_PAYLOAD_FIELDS
}

impl EngineConfig {
    /// Configuration with defaults for everything but the schema directory
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            unknown_fields: UnknownFieldPolicy::default(),
            source: default_source(),
            log_filter: default_log_filter(),
            max_payload_fields: default_max_payload_fields(),
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: EngineConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Malformed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("schema_dir", "must not be empty"));
        }

        if self.source.trim().is_empty() {
            return Err(ConfigError::invalid("source", "must not be empty"));
        }

        if self.max_payload_fields == 0 {
            return Err(ConfigError::invalid("max_payload_fields", "must be > 0"));
        }

        Ok(())
    }

    /// Build a materializer over `registry` with this configuration's limits
    pub fn materializer(&self, registry: Arc<SchemaRegistry>) -> ObjectMaterializer {
        ObjectMaterializer::new(registry)
            .with_unknown_fields(self.unknown_fields)
            .with_max_payload_fields(self.max_payload_fields)
    }
}
