//! Schema registry: object types loaded once at startup
//!
//! - One JSON file per object type in the schema directory
//! - Duplicate or malformed files cause startup failure (FATAL)
//! - Read-only after load: lookups hand out shared `Arc<ObjectType>` views

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::errors::{SchemaError, SchemaResult};
use super::types::ObjectType;

/// Registry of object types, keyed by type identifier.
///
/// Registration takes `&mut self`; once the registry is shared behind an
/// `Arc` it can only be read, so concurrent lookups need no locking.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    types: HashMap<String, Arc<ObjectType>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `*.json` file in `dir` into a new registry.
    pub fn load_dir(dir: &Path) -> SchemaResult<Self> {
        let mut registry = Self::new();
        registry.load_all(dir)?;
        Ok(registry)
    }

    /// Loads every `*.json` file in `dir`.
    ///
    /// Files are visited in name order so failures are reproducible.
    pub fn load_all(&mut self, dir: &Path) -> SchemaResult<()> {
        let entries = fs::read_dir(dir).map_err(|e| {
            SchemaError::malformed(
                dir.display().to_string(),
                format!("Failed to read schema directory: {}", e),
            )
        })?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SchemaError::malformed(
                    dir.display().to_string(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            self.load_file(&path)?;
        }

        info!(
            schema_dir = %dir.display(),
            object_types = self.types.len(),
            "Schema registry loaded"
        );
        Ok(())
    }

    /// Loads and registers a single schema file.
    pub fn load_file(&mut self, path: &Path) -> SchemaResult<()> {
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::malformed(path.display().to_string(), format!("Failed to read file: {}", e))
        })?;

        let object_type: ObjectType = serde_json::from_str(&content).map_err(|e| {
            SchemaError::malformed(path.display().to_string(), format!("Invalid JSON: {}", e))
        })?;

        self.register(object_type)
    }

    /// Registers an object type.
    ///
    /// Fails with `DuplicateSchema` if the identifier is taken and with
    /// `InvalidSchema` if the type breaks its own structural rules.
    pub fn register(&mut self, object_type: ObjectType) -> SchemaResult<()> {
        object_type
            .validate_structure()
            .map_err(|reason| SchemaError::invalid(object_type.name(), reason))?;

        if self.types.contains_key(object_type.name()) {
            return Err(SchemaError::DuplicateSchema(object_type.name().to_string()));
        }

        debug!(
            object_type = object_type.name(),
            fields = object_type.fields().len(),
            tasks = object_type.tasks().len(),
            "Registered object type"
        );
        self.types
            .insert(object_type.name().to_string(), Arc::new(object_type));
        Ok(())
    }

    /// Resolves an object type by identifier.
    pub fn resolve(&self, name: &str) -> SchemaResult<Arc<ObjectType>> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownObjectType(name.to_string()))
    }

    /// Checks if an object type is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered type identifiers, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered object types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Writes a registered object type to `<dir>/<object_type>.json`.
    ///
    /// Refuses to overwrite an existing file.
    pub fn save(&self, name: &str, dir: &Path) -> SchemaResult<PathBuf> {
        let object_type = self.resolve(name)?;
        let path = dir.join(format!("{}.json", object_type.name()));

        if path.exists() {
            return Err(SchemaError::Immutable(object_type.name().to_string()));
        }

        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                SchemaError::malformed(
                    dir.display().to_string(),
                    format!("Failed to create schema directory: {}", e),
                )
            })?;
        }

        let content = serde_json::to_string_pretty(object_type.as_ref()).map_err(|e| {
            SchemaError::malformed(
                path.display().to_string(),
                format!("Failed to serialize schema: {}", e),
            )
        })?;

        fs::write(&path, content).map_err(|e| {
            SchemaError::malformed(path.display().to_string(), format!("Failed to write file: {}", e))
        })?;

        Ok(path)
    }
}
