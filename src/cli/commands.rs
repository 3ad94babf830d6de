//! CLI command implementations
//!
//! Every command loads the configuration first, then installs logging with
//! the configured filter, then builds only what it needs.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::engine::CallerContext;
use crate::object::{MaterializeError, ObjectMaterializer, Operation, ResponseView};
use crate::observability::init_logging;
use crate::schema::SchemaRegistry;

use super::args::Command;
use super::errors::CliResult;
use super::io::{error_response, ok_response, read_request, write_json};

/// Entry point for the CLI
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    let config = EngineConfig::load(&cli.config)?;
    init_logging(&config.log_filter);
    debug!(config = %cli.config.display(), "Configuration loaded");
    run_command(&config, cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(config: &EngineConfig, cmd: Command) -> CliResult<()> {
    match cmd {
        Command::CheckSchemas => check_schemas(config),
        Command::Materialize {
            object_type,
            user,
            roles,
        } => {
            let payload = read_request()?;
            let caller = CallerContext::with_roles(user, roles);
            let response = materialize(config, &object_type, &payload, &caller)?;
            write_json(&response)
        }
    }
}

/// Load every schema file and list the registered object types
pub fn check_schemas(config: &EngineConfig) -> CliResult<()> {
    let registry = load_registry(&config.schema_dir)?;
    write_json(&ok_response(describe_registry(&registry)))
}

/// Materialize `payload` as a new object without storing it
///
/// Validation failures become an error response, not a CLI error.
pub fn materialize(
    config: &EngineConfig,
    object_type: &str,
    payload: &Value,
    caller: &CallerContext,
) -> CliResult<Value> {
    let registry = Arc::new(load_registry(&config.schema_dir)?);
    let materializer = config.materializer(Arc::clone(&registry));
    Ok(materialize_response(&materializer, object_type, payload, caller))
}

fn load_registry(schema_dir: &Path) -> CliResult<SchemaRegistry> {
    let registry = SchemaRegistry::load_dir(schema_dir)?;
    info!(object_types = registry.len(), "Schemas checked");
    Ok(registry)
}

fn describe_registry(registry: &SchemaRegistry) -> Value {
    let types: Vec<Value> = registry
        .names()
        .into_iter()
        .filter_map(|name| registry.resolve(name).ok())
        .map(|object_type| {
            json!({
                "object_type": object_type.name(),
                "fields": object_type.fields().len(),
                "tasks": object_type.tasks().len(),
                "unique": object_type.unique_fields(),
            })
        })
        .collect();

    json!({
        "count": types.len(),
        "object_types": types,
    })
}

fn materialize_response(
    materializer: &ObjectMaterializer,
    object_type: &str,
    payload: &Value,
    caller: &CallerContext,
) -> Value {
    match materializer.materialize(object_type, Operation::Create, payload, caller) {
        Ok(object) => match materializer.registry().resolve(object_type) {
            Ok(schema) => ok_response(ResponseView::render(&schema, &object)),
            Err(e) => error_response(e.code(), &e.to_string(), None),
        },
        Err(e @ MaterializeError::Rejected(_)) => {
            error_response(e.code(), &e.to_string(), e.rejections())
        }
        Err(e) => error_response(e.code(), &e.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_with_schema() -> (TempDir, EngineConfig) {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("foobar.json"),
            r#"{
                "object_type": "foobar",
                "fields": [
                    {"name": "name", "type": "str"},
                    {"name": "status", "type": "string", "allowed_values": ["pending", "active"], "default": "pending"},
                    {"name": "token", "type": "string", "nullable": true, "drop_from_response": true}
                ]
            }"#,
        )
        .unwrap();
        let config = EngineConfig::new(dir.path());
        (dir, config)
    }

    #[test]
    fn test_materialize_success_renders_view() {
        let (_dir, config) = config_with_schema();
        let caller = CallerContext::new("cli");

        let response = materialize(&config, "foobar", &json!({"name": "n", "token": "t"}), &caller).unwrap();
        assert_eq!(response["status"], json!("ok"));
        assert_eq!(response["data"]["status"], json!("pending"));
        assert_eq!(response["data"]["created_user"], json!("cli"));
        assert!(response["data"].get("token").is_none());
    }

    #[test]
    fn test_materialize_rejection_response() {
        let (_dir, config) = config_with_schema();
        let caller = CallerContext::new("cli");

        let response = materialize(&config, "foobar", &json!({"status": "gone"}), &caller).unwrap();
        assert_eq!(response["status"], json!("error"));
        assert_eq!(response["code"], json!("OV_VALIDATION_FAILED"));
        assert_eq!(response["rejections"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_materialize_unknown_type() {
        let (_dir, config) = config_with_schema();
        let response = materialize(&config, "ghost", &json!({}), &CallerContext::new("cli")).unwrap();
        assert_eq!(response["code"], json!("OV_UNKNOWN_OBJECT_TYPE"));
    }

    #[test]
    fn test_describe_registry() {
        let (_dir, config) = config_with_schema();
        let registry = load_registry(&config.schema_dir).unwrap();
        let description = describe_registry(&registry);
        assert_eq!(description["count"], json!(1));
        assert_eq!(description["object_types"][0]["object_type"], json!("foobar"));
        assert_eq!(description["object_types"][0]["fields"], json!(3));
    }

    #[test]
    fn test_missing_schema_dir_is_cli_error() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new(dir.path().join("absent"));
        let err = materialize(&config, "foobar", &json!({}), &CallerContext::new("cli")).unwrap_err();
        assert_eq!(err.code(), "OV_MALFORMED_SCHEMA_FILE");
    }
}
