//! Object Service Tests
//!
//! End-to-end behavior through the public service API:
//! - Create stamps every system attribute
//! - Update round-trips and bumps the version by one
//! - Rejected writes leave the stored object untouched
//! - Role gates, unique fields, task dispatch
//! - Append-only lists grow across updates

use std::sync::Arc;

use ovcore::engine::{CallerContext, CoreError, ObjectService};
use ovcore::object::ObjectMaterializer;
use ovcore::ports::{InMemoryQueue, InMemoryStore, PersistencePort};
use ovcore::schema::{
    FieldKind, FieldRule, ObjectType, RejectionKind, SchemaRegistry, TaskEvent, TaskRule,
};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

type Service = ObjectService<InMemoryStore, InMemoryQueue>;

fn ticket_type() -> ObjectType {
    ObjectType::new(
        "ticket",
        vec![
            FieldRule::new("title", FieldKind::string()),
            FieldRule::new("status", FieldKind::one_of(["open", "closed"])).with_default("open"),
            FieldRule::new("owner_email", FieldKind::string()).nullable().unique(),
            FieldRule::new("priority", FieldKind::string())
                .with_default("normal")
                .restricted_to(["admin"]),
            FieldRule::new("resolution", FieldKind::string())
                .nullable()
                .writable(false, false),
            FieldRule::new("internal_note", FieldKind::string()).nullable().hidden(),
            FieldRule::new("watchers", FieldKind::Sequence)
                .with_default(json!([]))
                .set_append(),
        ],
    )
    .with_tasks(vec![
        TaskRule::on("ticket-audit", &[TaskEvent::Created, TaskEvent::Updated]),
        TaskRule::on_transition("ticket-closed", &[TaskEvent::Updated], "status", "closed"),
    ])
}

fn service() -> Service {
    let mut registry = SchemaRegistry::new();
    registry.register(ticket_type()).unwrap();
    ObjectService::new(
        ObjectMaterializer::new(Arc::new(registry)),
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryQueue::new()),
    )
    .with_source("helpdesk")
}

fn alice() -> CallerContext {
    CallerContext::with_roles("alice", ["user"])
}

// =============================================================================
// Create Tests
// =============================================================================

#[test]
fn test_create_sets_system_attributes() {
    let svc = service();
    let outcome = svc
        .create(
            "ticket",
            &json!({"title": "Printer", "created_user": "mallory", "version": 7}),
            &alice(),
        )
        .unwrap();
    let object = outcome.object;

    assert_eq!(object.object_type(), "ticket");
    assert_eq!(object.created_user(), "alice");
    assert_eq!(object.updated_user(), "alice");
    assert_eq!(object.created_dt(), object.updated_dt());
    assert_eq!(object.version(), 1);
    assert!(!object.id().is_empty());
    assert_eq!(svc.get("ticket", object.key()).unwrap(), object);
}

#[test]
fn test_empty_create_uses_default_status() {
    let svc = service();
    let object = svc.create("ticket", &json!({"title": "t"}), &alice()).unwrap().object;
    assert_eq!(object.field("status"), Some(&json!("open")));
}

#[test]
fn test_duplicate_key() {
    let svc = service();
    svc.create("ticket", &json!({"title": "t", "key": "T-1"}), &alice())
        .unwrap();

    let err = svc
        .create("ticket", &json!({"title": "u", "key": "T-1"}), &alice())
        .unwrap_err();
    assert_eq!(
        err,
        CoreError::DuplicateKey {
            object_type: "ticket".into(),
            key: "T-1".into()
        }
    );
}

#[test]
fn test_missing_field_creates_nothing() {
    let svc = service();
    let err = svc.create("ticket", &json!({}), &alice()).unwrap_err();

    let list = err.rejections().unwrap();
    assert_eq!(list.len(), 1);
    assert!(list.contains("title", RejectionKind::MissingRequiredField));
    assert!(svc.store().is_empty());
    assert_eq!(svc.queue().total(), 0);
}

// =============================================================================
// Update Tests
// =============================================================================

#[test]
fn test_round_trip_update() {
    let svc = service();
    let created = svc
        .create("ticket", &json!({"title": "t", "owner_email": "a@x.io"}), &alice())
        .unwrap()
        .object;

    let bob = CallerContext::with_roles("bob", ["user"]);
    let updated = svc
        .update(
            "ticket",
            created.key(),
            &json!({"title": "t", "owner_email": "a@x.io"}),
            &bob,
            created.version(),
        )
        .unwrap()
        .object;

    assert_eq!(updated.version(), created.version() + 1);
    assert_eq!(updated.fields(), created.fields());
    assert_eq!(updated.id(), created.id());
    assert_eq!(updated.created_user(), created.created_user());
    assert_eq!(updated.created_dt(), created.created_dt());
    assert_eq!(updated.updated_user(), "bob");
}

#[test]
fn test_rejected_update_leaves_object_unchanged() {
    let svc = service();
    let created = svc.create("ticket", &json!({"title": "t"}), &alice()).unwrap().object;

    let err = svc
        .update("ticket", created.key(), &json!({"status": "archived"}), &alice(), 1)
        .unwrap_err();
    assert!(err.rejections().unwrap().contains("status", RejectionKind::ValueNotAllowed));

    let stored = svc.get("ticket", created.key()).unwrap();
    assert_eq!(stored, created);
    assert_eq!(stored.version(), 1);
}

#[test]
fn test_stale_update_conflicts() {
    let svc = service();
    let created = svc.create("ticket", &json!({"title": "t"}), &alice()).unwrap().object;
    svc.update("ticket", created.key(), &json!({"title": "u"}), &alice(), 1)
        .unwrap();

    let err = svc
        .update("ticket", created.key(), &json!({"title": "v"}), &alice(), 1)
        .unwrap_err();
    assert_eq!(err.code(), "OV_VERSION_CONFLICT");
    assert_eq!(svc.get("ticket", created.key()).unwrap().field("title"), Some(&json!("u")));
}

#[test]
fn test_system_update_sets_locked_field() {
    let svc = service();
    let created = svc.create("ticket", &json!({"title": "t"}), &alice()).unwrap().object;

    let ignored = svc
        .update("ticket", created.key(), &json!({"resolution": "fixed"}), &alice(), 1)
        .unwrap()
        .object;
    assert_eq!(ignored.field("resolution"), Some(&json!(null)));

    let system = CallerContext::new("resolver-job");
    let resolved = svc
        .system_update("ticket", created.key(), &json!({"resolution": "fixed"}), &system, 2)
        .unwrap()
        .object;
    assert_eq!(resolved.field("resolution"), Some(&json!("fixed")));
    assert_eq!(resolved.version(), 3);
}

// =============================================================================
// Role Gate Tests
// =============================================================================

#[test]
fn test_role_gate() {
    let svc = service();
    let payload = json!({"title": "t", "priority": "urgent"});

    let err = svc.create("ticket", &payload, &alice()).unwrap_err();
    assert!(err.rejections().unwrap().contains("priority", RejectionKind::InsufficientRole));

    let admin = CallerContext::with_roles("root", ["admin", "user"]);
    let object = svc.create("ticket", &payload, &admin).unwrap().object;
    assert_eq!(object.field("priority"), Some(&json!("urgent")));
}

#[test]
fn test_role_gate_on_update() {
    let svc = service();
    let created = svc.create("ticket", &json!({"title": "t"}), &alice()).unwrap().object;

    let err = svc
        .update("ticket", created.key(), &json!({"priority": "urgent"}), &alice(), 1)
        .unwrap_err();
    assert_eq!(err.code(), "OV_VALIDATION_FAILED");
    assert!(err.rejections().unwrap().contains("priority", RejectionKind::InsufficientRole));

    let stored = svc.get("ticket", created.key()).unwrap();
    assert_eq!(stored, created);
    assert_eq!(stored.version(), 1);
    assert_eq!(stored.field("priority"), Some(&json!("normal")));

    let admin = CallerContext::with_roles("root", ["admin"]);
    let updated = svc
        .update("ticket", created.key(), &json!({"priority": "urgent"}), &admin, 1)
        .unwrap()
        .object;
    assert_eq!(updated.field("priority"), Some(&json!("urgent")));
    assert_eq!(updated.version(), 2);
    assert_eq!(updated.updated_user(), "root");
}

#[test]
fn test_role_gated_field_carried_on_update() {
    let svc = service();
    let admin = CallerContext::with_roles("root", ["admin"]);
    let created = svc
        .create("ticket", &json!({"title": "t", "priority": "urgent"}), &admin)
        .unwrap()
        .object;

    let updated = svc
        .update("ticket", created.key(), &json!({"title": "renamed"}), &alice(), 1)
        .unwrap()
        .object;
    assert_eq!(updated.field("priority"), Some(&json!("urgent")));
}

// =============================================================================
// Append-Only Tests
// =============================================================================

#[test]
fn test_watchers_accumulate_across_updates() {
    let svc = service();
    let created = svc
        .create("ticket", &json!({"title": "t", "watchers": ["alice"]}), &alice())
        .unwrap()
        .object;

    svc.update("ticket", created.key(), &json!({"watchers": ["bob", "alice"]}), &alice(), 1)
        .unwrap();
    let stored = svc
        .update("ticket", created.key(), &json!({"watchers": ["carol"]}), &alice(), 2)
        .unwrap()
        .object;
    assert_eq!(stored.field("watchers"), Some(&json!(["alice", "bob", "carol"])));
    assert_eq!(stored.version(), 3);

    // Stale appends are refused like any other stale write
    let err = svc
        .update("ticket", created.key(), &json!({"watchers": ["dave"]}), &alice(), 2)
        .unwrap_err();
    assert_eq!(err.code(), "OV_VERSION_CONFLICT");
    assert_eq!(
        svc.get("ticket", created.key()).unwrap().field("watchers"),
        Some(&json!(["alice", "bob", "carol"]))
    );
}

// =============================================================================
// Unique Field Tests
// =============================================================================

#[test]
fn test_unique_violation_distinct_from_duplicate_key() {
    let svc = service();
    svc.create("ticket", &json!({"title": "a", "owner_email": "a@x.io"}), &alice())
        .unwrap();

    let err = svc
        .create("ticket", &json!({"title": "b", "owner_email": "a@x.io"}), &alice())
        .unwrap_err();
    assert_eq!(
        err,
        CoreError::UniqueViolation {
            fields: vec!["owner_email".into()]
        }
    );
    assert_eq!(svc.store().len(), 1);
}

// =============================================================================
// Dispatch Tests
// =============================================================================

#[test]
fn test_transition_dispatch() {
    let svc = service();
    let created = svc.create("ticket", &json!({"title": "t"}), &alice()).unwrap().object;

    let closed = svc
        .update("ticket", created.key(), &json!({"status": "closed"}), &alice(), 1)
        .unwrap();
    assert_eq!(
        closed.dispatched,
        vec!["ticket-audit".to_string(), "ticket-closed".to_string()]
    );

    let messages = svc.queue().messages("ticket-closed");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].metadata.source, "helpdesk");
    assert_eq!(messages[0].metadata.event, TaskEvent::Updated);
    assert_eq!(messages[0].metadata.version, 2);
    assert_eq!(messages[0].data["status"], json!("closed"));

    // Already closed: audit fires, transition does not
    let again = svc
        .update("ticket", created.key(), &json!({"title": "u"}), &alice(), 2)
        .unwrap();
    assert_eq!(again.dispatched, vec!["ticket-audit".to_string()]);
    assert_eq!(svc.queue().messages("ticket-audit").len(), 3);
}

#[test]
fn test_envelope_uses_response_view() {
    let svc = service();
    svc.create("ticket", &json!({"title": "t", "internal_note": "secret"}), &alice())
        .unwrap();

    let messages = svc.queue().messages("ticket-audit");
    assert!(messages[0].data.get("internal_note").is_none());
    assert_eq!(messages[0].data["title"], json!("t"));
}

#[test]
fn test_dispatch_failure_does_not_roll_back() {
    let svc = service();
    svc.queue().set_failing(true);

    let outcome = svc.create("ticket", &json!({"title": "t"}), &alice()).unwrap();
    assert!(outcome.dispatched.is_empty());
    assert_eq!(outcome.dispatch_failures.len(), 1);
    assert_eq!(
        svc.store().get("ticket", outcome.object.key()).unwrap(),
        outcome.object
    );
}

// =============================================================================
// Read / Delete / Render Tests
// =============================================================================

#[test]
fn test_render_drops_hidden_fields() {
    let svc = service();
    let object = svc
        .create("ticket", &json!({"title": "t", "internal_note": "secret"}), &alice())
        .unwrap()
        .object;

    let view = svc.render("ticket", &object).unwrap();
    assert!(view.get("internal_note").is_none());
    assert_eq!(view["key"], json!(object.key()));
    assert_eq!(object.field("internal_note"), Some(&json!("secret")));
}

#[test]
fn test_delete() {
    let svc = service();
    let object = svc.create("ticket", &json!({"title": "t"}), &alice()).unwrap().object;

    svc.delete("ticket", object.key(), &alice()).unwrap();
    assert_eq!(svc.get("ticket", object.key()).unwrap_err().code(), "OV_NOT_FOUND");
    assert_eq!(
        svc.delete("ticket", object.key(), &alice()).unwrap_err().code(),
        "OV_NOT_FOUND"
    );
}

#[test]
fn test_store_outage_surfaces() {
    let svc = service();
    svc.store().set_available(false);

    let err = svc.create("ticket", &json!({"title": "t"}), &alice()).unwrap_err();
    assert_eq!(err.code(), "OV_STORE_UNAVAILABLE");
    assert_eq!(err.status_code(), 503);
}
