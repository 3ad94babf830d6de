//! Object materializer
//!
//! Turns a raw payload into a `ManagedObject` in two phases:
//!
//! 1. Field phase: every declared field goes through the field validator.
//!    Rejections are collected, never short-circuited, so the caller sees
//!    every problem with the payload at once.
//! 2. System phase: the mandatory attributes are stamped. Payload values for
//!    them are ignored, except a caller-chosen `key` on create.
//!
//! Field validation runs before the version check: a payload that is both
//! invalid and stale is reported as invalid.
//!
//! On update, lists written to append-only fields are folded into the stored
//! list; the result is written under the same version check as every other
//! field.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::errors::{MaterializeError, MaterializeResult};
use super::managed::{is_system_attribute, ManagedObject, SystemAttributes};
use crate::engine::CallerContext;
use crate::schema::{
    json_type_name, FieldContext, FieldRejection, FieldRule, FieldValidator, ObjectType,
    OperationKind, RejectionList, SchemaRegistry, Validated,
};
use crate::version::VersionGuard;

/// Default upper bound on the number of payload keys
pub const DEFAULT_MAX_PAYLOAD_FIELDS: usize = 1024;

/// What to do with payload keys the object type does not declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFieldPolicy {
    /// Drop them silently
    #[default]
    Drop,
    /// Reject each one with UNKNOWN_FIELD
    Reject,
}

/// The write a payload is materialized for.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Create,
    /// Caller update, governed by `patch_value`
    Update {
        existing: &'a ManagedObject,
        expected_version: u64,
    },
    /// Internal update that may set any field
    System {
        existing: &'a ManagedObject,
        expected_version: u64,
    },
}

impl<'a> Operation<'a> {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Create => OperationKind::Create,
            Operation::Update { .. } => OperationKind::Update,
            Operation::System { .. } => OperationKind::System,
        }
    }

    pub fn existing(&self) -> Option<&'a ManagedObject> {
        match *self {
            Operation::Create => None,
            Operation::Update { existing, .. } | Operation::System { existing, .. } => {
                Some(existing)
            }
        }
    }
}

/// Builds managed objects from payloads.
///
/// Holds only the shared read-only registry, so one materializer can serve
/// any number of threads.
#[derive(Debug, Clone)]
pub struct ObjectMaterializer {
    registry: Arc<SchemaRegistry>,
    unknown_fields: UnknownFieldPolicy,
    max_payload_fields: usize,
}

impl ObjectMaterializer {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            unknown_fields: UnknownFieldPolicy::default(),
            max_payload_fields: DEFAULT_MAX_PAYLOAD_FIELDS,
        }
    }

    pub fn with_unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }

    pub fn with_max_payload_fields(mut self, limit: usize) -> Self {
        self.max_payload_fields = limit;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Materializes `payload` as an object of `type_name`.
    pub fn materialize(
        &self,
        type_name: &str,
        operation: Operation<'_>,
        payload: &Value,
        caller: &CallerContext,
    ) -> MaterializeResult<ManagedObject> {
        self.materialize_at(type_name, operation, payload, caller, Utc::now())
    }

    /// Materializes with an explicit clock reading.
    pub fn materialize_at(
        &self,
        type_name: &str,
        operation: Operation<'_>,
        payload: &Value,
        caller: &CallerContext,
        now: DateTime<Utc>,
    ) -> MaterializeResult<ManagedObject> {
        let object_type = self.registry.resolve(type_name)?;
        let existing = operation.existing();

        if let Some(existing) = existing {
            if existing.object_type() != object_type.name() {
                return Err(MaterializeError::ObjectTypeMismatch {
                    expected: object_type.name().to_string(),
                    actual: existing.object_type().to_string(),
                });
            }
        }

        let payload = match payload {
            Value::Object(map) => map,
            other => {
                let rejection =
                    FieldRejection::type_mismatch("$root", "mapping", json_type_name(other));
                return Err(MaterializeError::Rejected(RejectionList::from(vec![rejection])));
            }
        };

        if payload.len() > self.max_payload_fields {
            return Err(MaterializeError::PayloadTooLarge {
                fields: payload.len(),
                limit: self.max_payload_fields,
            });
        }

        let ctx = FieldContext {
            roles: &caller.roles,
            operation: operation.kind(),
            now,
        };

        let mut rejections = RejectionList::new();
        let fields = self.materialize_fields(&object_type, payload, existing, &ctx, &mut rejections);
        self.check_unknown_fields(&object_type, payload, &mut rejections);

        let key = match existing {
            Some(existing) => existing.key().to_string(),
            None => match caller_key(payload) {
                Ok(key) => key,
                Err(rejection) => {
                    rejections.push(rejection);
                    String::new()
                }
            },
        };

        if !rejections.is_empty() {
            debug!(
                object_type = object_type.name(),
                operation = %operation.kind(),
                rejections = rejections.len(),
                "Payload rejected"
            );
            return Err(MaterializeError::Rejected(rejections));
        }

        let system = match operation {
            Operation::Create => SystemAttributes::for_create(
                object_type.name(),
                key,
                &caller.identity,
                now,
                VersionGuard::initial(),
            ),
            Operation::Update {
                existing,
                expected_version,
            }
            | Operation::System {
                existing,
                expected_version,
            } => {
                let version = VersionGuard::advance(existing.version(), expected_version)?;
                existing.system().for_update(&caller.identity, now, version)
            }
        };

        Ok(ManagedObject::new(system, fields))
    }

    fn materialize_fields(
        &self,
        object_type: &ObjectType,
        payload: &Map<String, Value>,
        existing: Option<&ManagedObject>,
        ctx: &FieldContext<'_>,
        rejections: &mut RejectionList,
    ) -> BTreeMap<String, Value> {
        let mut fields = BTreeMap::new();

        for rule in object_type.fields() {
            if is_system_attribute(&rule.name) {
                continue;
            }

            let outcome = match payload.get(&rule.name) {
                None => fallback(rule, existing, ctx.now),
                Some(candidate) => match FieldValidator::validate(rule, Some(candidate), ctx) {
                    Ok(Validated::Value(value)) => Ok(match existing {
                        Some(object) => rule.append_to(object.field(&rule.name), value),
                        None => value,
                    }),
                    Ok(Validated::Ignored) => fallback(rule, existing, ctx.now),
                    Err(rejection) => Err(rejection),
                },
            };

            match outcome {
                Ok(value) => {
                    fields.insert(rule.name.clone(), value);
                }
                Err(rejection) => rejections.push(rejection),
            }
        }

        fields
    }

    fn check_unknown_fields(
        &self,
        object_type: &ObjectType,
        payload: &Map<String, Value>,
        rejections: &mut RejectionList,
    ) {
        if self.unknown_fields == UnknownFieldPolicy::Drop {
            return;
        }
        for name in payload.keys() {
            if object_type.field(name).is_none() && !is_system_attribute(name) {
                rejections.push(FieldRejection::unknown_field(name));
            }
        }
    }
}

/// Value for a field the payload does not set: the stored value on update,
/// otherwise the field's absent-value rule.
fn fallback(
    rule: &FieldRule,
    existing: Option<&ManagedObject>,
    now: DateTime<Utc>,
) -> Result<Value, FieldRejection> {
    match existing.and_then(|object| object.field(&rule.name)) {
        Some(previous) => {
            FieldValidator::check_value(rule, previous)?;
            Ok(previous.clone())
        }
        None => FieldValidator::absent_value(rule, now),
    }
}

/// Key chosen by the caller on create, or a generated one.
fn caller_key(payload: &Map<String, Value>) -> Result<String, FieldRejection> {
    match payload.get("key") {
        None | Some(Value::Null) => Ok(Uuid::new_v4().simple().to_string()),
        Some(Value::String(key)) if !key.is_empty() => Ok(key.clone()),
        Some(Value::String(_)) => Err(FieldRejection::type_mismatch(
            "key",
            "non-empty string",
            "empty string",
        )),
        Some(other) => Err(FieldRejection::type_mismatch(
            "key",
            "non-empty string",
            json_type_name(other),
        )),
    }
}
