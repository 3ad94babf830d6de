//! Field validator: one rule, one candidate value
//!
//! Checks run in a fixed order and the first failure wins:
//! 1. Absent: default, else null if nullable, else MISSING_REQUIRED_FIELD
//! 2. Null on a non-nullable field: NULL_NOT_ALLOWED
//! 3. JSON type against the field kind: TYPE_MISMATCH
//! 4. Allowed-value set: VALUE_NOT_ALLOWED
//! 5. Writability for the operation: value ignored, not an error
//! 6. Role gate: INSUFFICIENT_ROLE
//!
//! The validator is a pure function of its inputs. It never sees stored
//! objects; falling back to an existing value is the materializer's job.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::FieldRejection;
use super::types::{FieldDefault, FieldRule};

/// Kind of write being validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// POST: `post_value` governs writability
    Create,
    /// PATCH: `patch_value` governs writability
    Update,
    /// Internal write: every field is writable, role gates still apply
    System,
}

impl OperationKind {
    /// Whether this operation may set the field at all
    pub fn may_write(&self, rule: &FieldRule) -> bool {
        match self {
            OperationKind::Create => rule.post_writable,
            OperationKind::Update => rule.patch_writable,
            OperationKind::System => true,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::System => write!(f, "system"),
        }
    }
}

/// Per-request inputs shared by every field check
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub roles: &'a BTreeSet<String>,
    pub operation: OperationKind,
    /// Timestamp used for generated defaults
    pub now: DateTime<Utc>,
}

/// Outcome of a successful field check
#[derive(Debug, Clone, PartialEq)]
pub enum Validated {
    /// The value to store
    Value(Value),
    /// Supplied but not settable by this operation; keep the fallback
    Ignored,
}

/// Stateless field validator.
pub struct FieldValidator;

impl FieldValidator {
    /// Validates one candidate value against one rule.
    ///
    /// `candidate` is `None` when the key is absent from the payload.
    pub fn validate(
        rule: &FieldRule,
        candidate: Option<&Value>,
        ctx: &FieldContext<'_>,
    ) -> Result<Validated, FieldRejection> {
        let value = match candidate {
            None => return Self::absent_value(rule, ctx.now).map(Validated::Value),
            Some(value) => value,
        };

        Self::check_value(rule, value)?;

        if !ctx.operation.may_write(rule) {
            return Ok(Validated::Ignored);
        }

        if !rule.update_roles.is_empty() && rule.update_roles.is_disjoint(ctx.roles) {
            return Err(FieldRejection::insufficient_role(
                &rule.name,
                describe_roles(&rule.update_roles),
            ));
        }

        Ok(Validated::Value(value.clone()))
    }

    /// Resolves the value of an absent field (step 1).
    pub fn absent_value(rule: &FieldRule, now: DateTime<Utc>) -> Result<Value, FieldRejection> {
        match &rule.default {
            FieldDefault::Value(value) => Ok(value.clone()),
            FieldDefault::Now => rule.kind.timestamp(now).ok_or_else(|| {
                FieldRejection::type_mismatch(&rule.name, rule.kind.type_name(), "timestamp")
            }),
            FieldDefault::Null if rule.nullable => Ok(Value::Null),
            FieldDefault::Null => Err(FieldRejection::null_value(&rule.name)),
            FieldDefault::Undefined if rule.nullable => Ok(Value::Null),
            FieldDefault::Undefined => Err(FieldRejection::missing_field(&rule.name)),
        }
    }

    /// Checks a present value's nullability, type, and allowed values
    /// (steps 2 through 4).
    ///
    /// `null` on a nullable field skips the type and allowed-value checks.
    pub fn check_value(rule: &FieldRule, value: &Value) -> Result<(), FieldRejection> {
        if value.is_null() {
            return if rule.nullable {
                Ok(())
            } else {
                Err(FieldRejection::null_value(&rule.name))
            };
        }

        if !rule.kind.matches(value) {
            return Err(FieldRejection::type_mismatch(
                &rule.name,
                rule.kind.type_name(),
                json_type_name(value),
            ));
        }

        if !rule.kind.allows(value) {
            return Err(FieldRejection::not_allowed(
                &rule.name,
                rule.kind.describe_allowed(),
                value.to_string(),
            ));
        }

        Ok(())
    }
}

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_i64() {
                "integer"
            } else if n.is_u64() {
                "unsigned integer"
            } else {
                "float"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

fn describe_roles(roles: &BTreeSet<String>) -> String {
    let names: Vec<&str> = roles.iter().map(String::as_str).collect();
    format!("any of roles [{}]", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::errors::RejectionKind;
    use crate::schema::types::FieldKind;
    use serde_json::json;

    fn roles(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn ctx<'a>(roles: &'a BTreeSet<String>, operation: OperationKind) -> FieldContext<'a> {
        FieldContext {
            roles,
            operation,
            now: Utc::now(),
        }
    }

    fn kind_of(result: Result<Validated, FieldRejection>) -> RejectionKind {
        result.unwrap_err().kind
    }

    #[test]
    fn test_absent_uses_default() {
        let rule = FieldRule::new("status", FieldKind::one_of(["open", "closed"])).with_default("open");
        let r = roles(&[]);
        let result = FieldValidator::validate(&rule, None, &ctx(&r, OperationKind::Create));
        assert_eq!(result.unwrap(), Validated::Value(json!("open")));
    }

    #[test]
    fn test_absent_nullable_is_null() {
        let rule = FieldRule::new("note", FieldKind::string()).nullable();
        let r = roles(&[]);
        let result = FieldValidator::validate(&rule, None, &ctx(&r, OperationKind::Create));
        assert_eq!(result.unwrap(), Validated::Value(Value::Null));
    }

    #[test]
    fn test_absent_required_is_missing() {
        let rule = FieldRule::new("name", FieldKind::string());
        let r = roles(&[]);
        let result = FieldValidator::validate(&rule, None, &ctx(&r, OperationKind::Create));
        assert_eq!(kind_of(result), RejectionKind::MissingRequiredField);
    }

    #[test]
    fn test_absent_now_default_renders_per_kind() {
        let now = Utc::now();
        let float_rule = FieldRule::new("seen", FieldKind::float()).default_now();
        let string_rule = FieldRule::new("seen_at", FieldKind::string()).default_now();

        let float_value = FieldValidator::absent_value(&float_rule, now).unwrap();
        assert!(float_value.as_f64().unwrap() > 1_577_836_800.0);

        let string_value = FieldValidator::absent_value(&string_rule, now).unwrap();
        assert_eq!(string_value, json!(now.to_rfc3339()));
    }

    #[test]
    fn test_null_not_allowed() {
        let rule = FieldRule::new("name", FieldKind::string());
        let r = roles(&[]);
        let result = FieldValidator::validate(&rule, Some(&Value::Null), &ctx(&r, OperationKind::Create));
        assert_eq!(kind_of(result), RejectionKind::NullNotAllowed);
    }

    #[test]
    fn test_null_on_constrained_nullable_field_passes() {
        let rule = FieldRule::new("status", FieldKind::one_of(["open"])).nullable();
        let r = roles(&[]);
        let result = FieldValidator::validate(&rule, Some(&Value::Null), &ctx(&r, OperationKind::Create));
        assert_eq!(result.unwrap(), Validated::Value(Value::Null));
    }

    #[test]
    fn test_type_mismatch_reports_both_types() {
        let rule = FieldRule::new("age", FieldKind::integer());
        let r = roles(&[]);
        let rejection =
            FieldValidator::validate(&rule, Some(&json!("42")), &ctx(&r, OperationKind::Create))
                .unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::TypeMismatch);
        assert_eq!(rejection.expected, "integer");
        assert_eq!(rejection.actual, "string");
    }

    #[test]
    fn test_integer_beyond_i64_rejected() {
        let rule = FieldRule::new("count", FieldKind::integer());
        let r = roles(&[]);
        let rejection =
            FieldValidator::validate(&rule, Some(&json!(u64::MAX)), &ctx(&r, OperationKind::Create))
                .unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::TypeMismatch);
        assert_eq!(rejection.actual, "unsigned integer");

        let ok = FieldValidator::validate(&rule, Some(&json!(i64::MAX)), &ctx(&r, OperationKind::Create));
        assert_eq!(ok, Ok(Validated::Value(json!(i64::MAX))));
    }

    #[test]
    fn test_boolean_is_not_numeric() {
        let rule = FieldRule::new("score", FieldKind::float());
        let r = roles(&[]);
        let result = FieldValidator::validate(&rule, Some(&json!(true)), &ctx(&r, OperationKind::Create));
        assert_eq!(kind_of(result), RejectionKind::TypeMismatch);
    }

    #[test]
    fn test_value_not_allowed() {
        let rule = FieldRule::new("status", FieldKind::one_of(["open", "closed"]));
        let r = roles(&[]);
        let result =
            FieldValidator::validate(&rule, Some(&json!("archived")), &ctx(&r, OperationKind::Update));
        assert_eq!(kind_of(result), RejectionKind::ValueNotAllowed);
    }

    #[test]
    fn test_type_check_precedes_writability() {
        let rule = FieldRule::new("age", FieldKind::integer()).writable(false, false);
        let r = roles(&[]);
        let result = FieldValidator::validate(&rule, Some(&json!("x")), &ctx(&r, OperationKind::Create));
        assert_eq!(kind_of(result), RejectionKind::TypeMismatch);
    }

    #[test]
    fn test_not_writable_is_ignored() {
        let rule = FieldRule::new("key", FieldKind::string()).writable(false, true);
        let r = roles(&[]);
        let c = ctx(&r, OperationKind::Create);
        assert_eq!(
            FieldValidator::validate(&rule, Some(&json!("k")), &c).unwrap(),
            Validated::Ignored
        );

        let rule = FieldRule::new("email", FieldKind::string()).writable(true, false);
        let c = ctx(&r, OperationKind::Update);
        assert_eq!(
            FieldValidator::validate(&rule, Some(&json!("a@b.c")), &c).unwrap(),
            Validated::Ignored
        );
    }

    #[test]
    fn test_system_operation_ignores_writability() {
        let rule = FieldRule::new("state", FieldKind::string()).writable(false, false);
        let r = roles(&[]);
        let result = FieldValidator::validate(&rule, Some(&json!("done")), &ctx(&r, OperationKind::System));
        assert_eq!(result.unwrap(), Validated::Value(json!("done")));
    }

    #[test]
    fn test_role_gate() {
        let rule = FieldRule::new("tier", FieldKind::string()).restricted_to(["admin"]);
        let user = roles(&["user"]);
        let admin = roles(&["admin", "user"]);

        let denied = FieldValidator::validate(&rule, Some(&json!("gold")), &ctx(&user, OperationKind::Create));
        assert_eq!(kind_of(denied), RejectionKind::InsufficientRole);

        let allowed =
            FieldValidator::validate(&rule, Some(&json!("gold")), &ctx(&admin, OperationKind::Create));
        assert_eq!(allowed.unwrap(), Validated::Value(json!("gold")));
    }

    #[test]
    fn test_role_gate_skipped_when_absent() {
        let rule = FieldRule::new("tier", FieldKind::string())
            .with_default("basic")
            .restricted_to(["admin"]);
        let user = roles(&["user"]);
        let result = FieldValidator::validate(&rule, None, &ctx(&user, OperationKind::Create));
        assert_eq!(result.unwrap(), Validated::Value(json!("basic")));
    }

    #[test]
    fn test_validation_is_repeatable() {
        let rule = FieldRule::new("status", FieldKind::one_of(["open"]));
        let r = roles(&[]);
        let c = ctx(&r, OperationKind::Create);
        let value = json!("closed");

        let first = FieldValidator::validate(&rule, Some(&value), &c);
        for _ in 0..10 {
            assert_eq!(FieldValidator::validate(&rule, Some(&value), &c), first);
        }
    }
}
