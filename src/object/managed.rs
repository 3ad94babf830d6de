//! Managed object - a validated, versioned instance of an object type
//!
//! All fields are private: objects are built by the materializer and read
//! through accessors. Stores round-trip them through serde.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Names of the attributes every object carries, owned by the system.
pub const SYSTEM_ATTRIBUTES: [&str; 8] = [
    "_id",
    "key",
    "object_type",
    "created_user",
    "created_dt",
    "updated_user",
    "updated_dt",
    "version",
];

/// Returns true if `name` is a system-owned attribute.
pub fn is_system_attribute(name: &str) -> bool {
    SYSTEM_ATTRIBUTES.contains(&name)
}

/// System-owned attributes, set only by the materializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemAttributes {
    #[serde(rename = "_id")]
    id: String,
    key: String,
    object_type: String,
    created_user: String,
    created_dt: DateTime<Utc>,
    updated_user: String,
    updated_dt: DateTime<Utc>,
    version: u64,
}

impl SystemAttributes {
    /// Attributes of a newly created object.
    pub(crate) fn for_create(
        object_type: &str,
        key: String,
        caller: &str,
        now: DateTime<Utc>,
        version: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            key,
            object_type: object_type.to_string(),
            created_user: caller.to_string(),
            created_dt: now,
            updated_user: caller.to_string(),
            updated_dt: now,
            version,
        }
    }

    /// Attributes after an update: `created_*`, identity, and key carried over.
    pub(crate) fn for_update(&self, caller: &str, now: DateTime<Utc>, version: u64) -> Self {
        Self {
            updated_user: caller.to_string(),
            updated_dt: now,
            version,
            ..self.clone()
        }
    }
}

/// A materialized object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedObject {
    #[serde(flatten)]
    system: SystemAttributes,
    #[serde(flatten)]
    fields: BTreeMap<String, Value>,
}

impl ManagedObject {
    pub(crate) fn new(system: SystemAttributes, fields: BTreeMap<String, Value>) -> Self {
        Self { system, fields }
    }

    /// Opaque unique identifier
    pub fn id(&self) -> &str {
        &self.system.id
    }

    /// Logical key, unique per object type
    pub fn key(&self) -> &str {
        &self.system.key
    }

    pub fn object_type(&self) -> &str {
        &self.system.object_type
    }

    pub fn created_user(&self) -> &str {
        &self.system.created_user
    }

    pub fn created_dt(&self) -> DateTime<Utc> {
        self.system.created_dt
    }

    pub fn updated_user(&self) -> &str {
        &self.system.updated_user
    }

    pub fn updated_dt(&self) -> DateTime<Utc> {
        self.system.updated_dt
    }

    /// Optimistic concurrency counter, starting at 1
    pub fn version(&self) -> u64 {
        self.system.version
    }

    pub fn system(&self) -> &SystemAttributes {
        &self.system
    }

    /// Schema-declared fields
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Looks up a schema-declared field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Flattened JSON form: system attributes followed by fields.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("_id".into(), Value::String(self.system.id.clone()));
        map.insert("key".into(), Value::String(self.system.key.clone()));
        map.insert(
            "object_type".into(),
            Value::String(self.system.object_type.clone()),
        );
        map.insert(
            "created_user".into(),
            Value::String(self.system.created_user.clone()),
        );
        map.insert(
            "created_dt".into(),
            Value::String(self.system.created_dt.to_rfc3339()),
        );
        map.insert(
            "updated_user".into(),
            Value::String(self.system.updated_user.clone()),
        );
        map.insert(
            "updated_dt".into(),
            Value::String(self.system.updated_dt.to_rfc3339()),
        );
        map.insert("version".into(), Value::from(self.system.version));
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.clone());
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ManagedObject {
        let now = Utc::now();
        let system = SystemAttributes::for_create("foobar", "k1".into(), "alice", now, 1);
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), json!("Alice"));
        fields.insert("tags".to_string(), json!(["a", "b"]));
        ManagedObject::new(system, fields)
    }

    #[test]
    fn test_system_attribute_names() {
        assert!(is_system_attribute("_id"));
        assert!(is_system_attribute("version"));
        assert!(!is_system_attribute("name"));
    }

    #[test]
    fn test_serde_round_trip_keeps_fields_apart() {
        let object = sample();
        let value = serde_json::to_value(&object).unwrap();
        assert_eq!(value["_id"], json!(object.id()));
        assert_eq!(value["name"], json!("Alice"));
        assert_eq!(value["version"], json!(1));

        let back: ManagedObject = serde_json::from_value(value).unwrap();
        assert_eq!(back, object);
        assert!(back.field("version").is_none());
        assert_eq!(back.fields().len(), 2);
    }

    #[test]
    fn test_update_carries_creation_attributes() {
        let object = sample();
        let later = object.created_dt() + chrono::Duration::seconds(5);
        let updated = object.system().for_update("bob", later, 2);

        assert_eq!(updated.id, object.id());
        assert_eq!(updated.key, "k1");
        assert_eq!(updated.created_user, "alice");
        assert_eq!(updated.created_dt, object.created_dt());
        assert_eq!(updated.updated_user, "bob");
        assert_eq!(updated.updated_dt, later);
        assert_eq!(updated.version, 2);
    }

    #[test]
    fn test_to_json_flattens() {
        let object = sample();
        let map = object.to_json();
        assert_eq!(map["key"], json!("k1"));
        assert_eq!(map["object_type"], json!("foobar"));
        assert_eq!(map["tags"], json!(["a", "b"]));
        assert_eq!(map.len(), SYSTEM_ATTRIBUTES.len() + 2);
    }
}
