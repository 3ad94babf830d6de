//! Schema type definitions
//!
//! Supported value types:
//! - string: UTF-8 string
//! - integer: 64-bit signed integer
//! - float: 64-bit floating point
//! - boolean: true / false
//! - mapping: JSON object with free-form keys
//! - sequence: JSON array with free-form elements
//!
//! Each value type is one variant of [`FieldKind`]; allowed values are typed
//! per variant so a rule can never carry a value set of the wrong type.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel used in schema files for a default generated at write time.
pub const NOW_DEFAULT: &str = "dt_now";

/// Field kind, tagged by `type` in schema files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    /// UTF-8 string
    #[serde(alias = "str")]
    String {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        allowed_values: Vec<String>,
    },
    /// 64-bit signed integer
    #[serde(alias = "int")]
    Integer {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        allowed_values: Vec<i64>,
    },
    /// 64-bit floating point
    Float {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        allowed_values: Vec<f64>,
    },
    /// Boolean
    #[serde(alias = "bool")]
    Boolean {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        allowed_values: Vec<bool>,
    },
    /// JSON object
    #[serde(alias = "dict")]
    Mapping,
    /// JSON array
    #[serde(alias = "list")]
    Sequence,
}

impl FieldKind {
    /// Unconstrained string kind
    pub fn string() -> Self {
        FieldKind::String {
            allowed_values: Vec::new(),
        }
    }

    /// String kind restricted to the given values
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldKind::String {
            allowed_values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Unconstrained integer kind
    pub fn integer() -> Self {
        FieldKind::Integer {
            allowed_values: Vec::new(),
        }
    }

    /// Unconstrained float kind
    pub fn float() -> Self {
        FieldKind::Float {
            allowed_values: Vec::new(),
        }
    }

    /// Unconstrained boolean kind
    pub fn boolean() -> Self {
        FieldKind::Boolean {
            allowed_values: Vec::new(),
        }
    }

    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String { .. } => "string",
            FieldKind::Integer { .. } => "integer",
            FieldKind::Float { .. } => "float",
            FieldKind::Boolean { .. } => "boolean",
            FieldKind::Mapping => "mapping",
            FieldKind::Sequence => "sequence",
        }
    }

    /// Checks the JSON type of a non-null value.
    ///
    /// No coercion: strings never match numeric kinds, booleans never match
    /// numeric kinds, and floats never match `integer`. Any JSON number
    /// matches `float`.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String { .. } => value.is_string(),
            FieldKind::Integer { .. } => value.is_i64(),
            FieldKind::Float { .. } => value.is_number(),
            FieldKind::Boolean { .. } => value.is_boolean(),
            FieldKind::Mapping => value.is_object(),
            FieldKind::Sequence => value.is_array(),
        }
    }

    /// Returns true when the kind declares a non-empty allowed-value set.
    pub fn is_constrained(&self) -> bool {
        match self {
            FieldKind::String { allowed_values } => !allowed_values.is_empty(),
            FieldKind::Integer { allowed_values } => !allowed_values.is_empty(),
            FieldKind::Float { allowed_values } => !allowed_values.is_empty(),
            FieldKind::Boolean { allowed_values } => !allowed_values.is_empty(),
            FieldKind::Mapping | FieldKind::Sequence => false,
        }
    }

    /// Checks a type-matched value against the allowed-value set.
    ///
    /// Unconstrained kinds allow everything.
    pub fn allows(&self, value: &Value) -> bool {
        match self {
            FieldKind::String { allowed_values } => {
                allowed_values.is_empty()
                    || value
                        .as_str()
                        .is_some_and(|s| allowed_values.iter().any(|a| a == s))
            }
            FieldKind::Integer { allowed_values } => {
                allowed_values.is_empty()
                    || value
                        .as_i64()
                        .is_some_and(|n| allowed_values.contains(&n))
            }
            FieldKind::Float { allowed_values } => {
                allowed_values.is_empty()
                    || value
                        .as_f64()
                        .is_some_and(|n| allowed_values.iter().any(|a| *a == n))
            }
            FieldKind::Boolean { allowed_values } => {
                allowed_values.is_empty()
                    || value
                        .as_bool()
                        .is_some_and(|b| allowed_values.contains(&b))
            }
            FieldKind::Mapping | FieldKind::Sequence => true,
        }
    }

    /// Human-readable allowed-value list for rejection messages
    pub fn describe_allowed(&self) -> String {
        fn join<T: fmt::Display>(values: &[T]) -> String {
            let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            format!("one of [{}]", parts.join(", "))
        }

        match self {
            FieldKind::String { allowed_values } => join(allowed_values),
            FieldKind::Integer { allowed_values } => join(allowed_values),
            FieldKind::Float { allowed_values } => join(allowed_values),
            FieldKind::Boolean { allowed_values } => join(allowed_values),
            FieldKind::Mapping | FieldKind::Sequence => "any value".into(),
        }
    }

    /// Renders a timestamp in this kind's representation.
    ///
    /// Float fields hold epoch seconds with millisecond precision, string
    /// fields RFC 3339. Other kinds have no timestamp representation.
    pub fn timestamp(&self, now: DateTime<Utc>) -> Option<Value> {
        match self {
            FieldKind::Float { .. } => {
                Some(Value::from(now.timestamp_millis() as f64 / 1000.0))
            }
            FieldKind::String { .. } => Some(Value::String(now.to_rfc3339())),
            _ => None,
        }
    }
}

/// Default applied when a field is absent on create.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldDefault {
    /// No default declared
    #[default]
    Undefined,
    /// Explicit `null`
    Null,
    /// A literal value
    Value(Value),
    /// Current time, rendered per field kind
    Now,
}

impl FieldDefault {
    pub fn is_undefined(&self) -> bool {
        matches!(self, FieldDefault::Undefined)
    }
}

impl Serialize for FieldDefault {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldDefault::Undefined | FieldDefault::Null => serializer.serialize_none(),
            FieldDefault::Value(value) => value.serialize(serializer),
            FieldDefault::Now => serializer.serialize_str(NOW_DEFAULT),
        }
    }
}

impl<'de> Deserialize<'de> for FieldDefault {
    // Only called when the key is present; absence goes through `Default`.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => FieldDefault::Null,
            Value::String(s) if s == NOW_DEFAULT => FieldDefault::Now,
            other => FieldDefault::Value(other),
        })
    }
}

fn yes() -> bool {
    true
}

/// One field of an object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Field name, unique within its object type
    pub name: String,
    /// Value type and allowed values
    #[serde(flatten)]
    pub kind: FieldKind,
    /// Value used when the field is absent on create
    #[serde(default, skip_serializing_if = "FieldDefault::is_undefined")]
    pub default: FieldDefault,
    /// Whether `null` is a legal value
    #[serde(default)]
    pub nullable: bool,
    /// Whether a create request may set the field
    #[serde(default = "yes", rename = "post_value")]
    pub post_writable: bool,
    /// Whether an update request may set the field
    #[serde(default = "yes", rename = "patch_value")]
    pub patch_writable: bool,
    /// Whether the field is stripped from caller-facing responses
    #[serde(default)]
    pub drop_from_response: bool,
    /// Store hint: maintain a secondary index
    #[serde(default)]
    pub indexed: bool,
    /// Store hint: value unique per object type
    #[serde(default)]
    pub unique: bool,
    /// Roles allowed to set the field; empty means any caller
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub update_roles: BTreeSet<String>,
    /// Sequence only: updates append to the stored list instead of replacing it
    #[serde(default)]
    pub append_only: bool,
    /// Sequence only: appends skip elements already in the stored list
    #[serde(default)]
    pub set_append: bool,
}

impl FieldRule {
    /// Create a non-nullable rule writable on both create and update
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: FieldDefault::Undefined,
            nullable: false,
            post_writable: true,
            patch_writable: true,
            drop_from_response: false,
            indexed: false,
            unique: false,
            update_roles: BTreeSet::new(),
            append_only: false,
            set_append: false,
        }
    }

    /// Allow `null`
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Set a literal default
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = match value.into() {
            Value::Null => FieldDefault::Null,
            other => FieldDefault::Value(other),
        };
        self
    }

    /// Default to the write time
    pub fn default_now(mut self) -> Self {
        self.default = FieldDefault::Now;
        self
    }

    /// Set per-verb writability
    pub fn writable(mut self, on_create: bool, on_update: bool) -> Self {
        self.post_writable = on_create;
        self.patch_writable = on_update;
        self
    }

    /// Restrict setting the field to holders of any of `roles`
    pub fn restricted_to<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Strip from responses
    pub fn hidden(mut self) -> Self {
        self.drop_from_response = true;
        self
    }

    /// Mark as indexed
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Mark as unique per object type (implies indexed)
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self.indexed = true;
        self
    }

    /// Updates append to the stored list
    pub fn append_only(mut self) -> Self {
        self.append_only = true;
        self
    }

    /// Updates append only elements not yet stored (implies append_only)
    pub fn set_append(mut self) -> Self {
        self.append_only = true;
        self.set_append = true;
        self
    }

    /// Folds an update value into the stored list of an append-only field.
    ///
    /// Non-append fields and non-list values pass through unchanged. A
    /// missing or non-list stored value counts as an empty list.
    pub fn append_to(&self, stored: Option<&Value>, supplied: Value) -> Value {
        let items = match supplied {
            Value::Array(items) if self.append_only => items,
            other => return other,
        };
        let mut merged = match stored {
            Some(Value::Array(existing)) => existing.clone(),
            _ => Vec::new(),
        };
        for item in items {
            if self.set_append && merged.contains(&item) {
                continue;
            }
            merged.push(item);
        }
        Value::Array(merged)
    }

    fn check_append(&self) -> Result<(), String> {
        if self.set_append && !self.append_only {
            return Err(format!(
                "field '{}' sets 'set_append' without 'append_only'",
                self.name
            ));
        }
        if self.append_only && self.kind != FieldKind::Sequence {
            return Err(format!(
                "field '{}' of type {} cannot be append-only",
                self.name,
                self.kind.type_name()
            ));
        }
        Ok(())
    }

    /// Checks the default against the rule's own constraints.
    fn check_default(&self) -> Result<(), String> {
        match &self.default {
            FieldDefault::Undefined => Ok(()),
            FieldDefault::Null if self.nullable => Ok(()),
            FieldDefault::Null => Err(format!(
                "field '{}' is not nullable but declares a null default",
                self.name
            )),
            // A generated timestamp can never be a member of a fixed value set
            FieldDefault::Now if self.kind.is_constrained() => Err(format!(
                "field '{}' declares allowed values and cannot default to '{}'",
                self.name, NOW_DEFAULT
            )),
            FieldDefault::Now => match self.kind.timestamp(Utc::now()) {
                Some(_) => Ok(()),
                None => Err(format!(
                    "field '{}' of type {} cannot default to '{}'",
                    self.name,
                    self.kind.type_name(),
                    NOW_DEFAULT
                )),
            },
            FieldDefault::Value(value) => {
                if !self.kind.matches(value) {
                    return Err(format!(
                        "default for field '{}' is not of type {}",
                        self.name,
                        self.kind.type_name()
                    ));
                }
                if !self.kind.allows(value) {
                    return Err(format!(
                        "default for field '{}' is not {}",
                        self.name,
                        self.kind.describe_allowed()
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Write events a task rule can react to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskEvent {
    Created,
    Updated,
}

impl fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskEvent::Created => write!(f, "created"),
            TaskEvent::Updated => write!(f, "updated"),
        }
    }
}

/// Follow-up work queued after a successful write.
///
/// Without `field`, the rule fires on every matching event. With `field` and
/// `equals`, it fires only when the written value equals `equals` and the
/// previous value did not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRule {
    /// Destination queue name
    pub queue: String,
    /// Events the rule reacts to
    pub events: Vec<TaskEvent>,
    /// Watched field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Value the watched field must transition to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,
}

impl TaskRule {
    /// Rule firing on every event in `events`
    pub fn on(queue: impl Into<String>, events: &[TaskEvent]) -> Self {
        Self {
            queue: queue.into(),
            events: events.to_vec(),
            field: None,
            equals: None,
        }
    }

    /// Rule firing when `field` transitions to `value`
    pub fn on_transition(
        queue: impl Into<String>,
        events: &[TaskEvent],
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            queue: queue.into(),
            events: events.to_vec(),
            field: Some(field.into()),
            equals: Some(value.into()),
        }
    }

    /// Decides whether the rule fires for one write.
    ///
    /// `previous` and `current` are the watched field's values before and
    /// after the write; `previous` is `None` for creates.
    pub fn fires(&self, event: TaskEvent, previous: Option<&Value>, current: Option<&Value>) -> bool {
        if !self.events.contains(&event) {
            return false;
        }
        match &self.equals {
            None => true,
            Some(target) => current == Some(target) && previous != Some(target),
        }
    }
}

/// An object type: its identifier, ordered field rules, and task rules.
///
/// Read-only once built; fields are private and exposed through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectType {
    object_type: String,
    fields: Vec<FieldRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tasks: Vec<TaskRule>,
}

impl ObjectType {
    /// Create an object type with no task rules
    pub fn new(object_type: impl Into<String>, fields: Vec<FieldRule>) -> Self {
        Self {
            object_type: object_type.into(),
            fields,
            tasks: Vec::new(),
        }
    }

    /// Attach task rules
    pub fn with_tasks(mut self, tasks: Vec<TaskRule>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Type identifier
    pub fn name(&self) -> &str {
        &self.object_type
    }

    /// Field rules in declaration order
    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    /// Looks up a rule by field name
    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Task rules in declaration order
    pub fn tasks(&self) -> &[TaskRule] {
        &self.tasks
    }

    /// Names of fields carrying the `indexed` hint
    pub fn indexed_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.indexed)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Names of fields carrying the `unique` hint
    pub fn unique_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.unique)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Names of fields stripped from responses
    pub fn hidden_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.drop_from_response)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Validates the object type itself (not an object)
    pub fn validate_structure(&self) -> Result<(), String> {
        if self.object_type.trim().is_empty() {
            return Err("object type identifier must not be empty".into());
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err("field names must not be empty".into());
            }
            if !seen.insert(field.name.as_str()) {
                return Err(format!("field '{}' is declared more than once", field.name));
            }
            field.check_default()?;
            field.check_append()?;
        }

        for task in &self.tasks {
            if task.queue.trim().is_empty() {
                return Err("task rules must name a queue".into());
            }
            if task.events.is_empty() {
                return Err(format!("task rule for '{}' lists no events", task.queue));
            }
            match (&task.field, &task.equals) {
                (Some(field), _) if !seen.contains(field.as_str()) => {
                    return Err(format!(
                        "task rule for '{}' watches undeclared field '{}'",
                        task.queue, field
                    ));
                }
                (None, Some(_)) => {
                    return Err(format!(
                        "task rule for '{}' sets 'equals' without 'field'",
                        task.queue
                    ));
                }
                _ => {}
            }
        }

        Ok(())
    }
}
