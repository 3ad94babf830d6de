//! Object Service
//!
//! Wires materialization, persistence, and task dispatch together:
//!
//! ```text
//! payload ─► materialize ─► put (compare-and-set) ─► dispatch task rules
//! ```
//!
//! Dispatch happens after the write is committed. A failed enqueue is
//! logged and reported in the outcome; the write stands.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use super::context::CallerContext;
use super::error::{CoreError, CoreResult};
use crate::object::{ManagedObject, ObjectMaterializer, Operation, ResponseView};
use crate::ports::{
    DispatchError, PersistencePort, TaskDispatchPort, TaskEnvelope, TaskMetadata, WriteHints,
};
use crate::schema::{ObjectType, TaskEvent};
use crate::version::WriteCondition;

/// Producer name stamped into task envelopes by default
pub const DEFAULT_SOURCE: &str = "ovcore";

/// Result of a committed write
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// The object as stored
    pub object: ManagedObject,
    /// Queues that accepted a task
    pub dispatched: Vec<String>,
    /// Enqueues that failed after the write committed
    pub dispatch_failures: Vec<DispatchError>,
}

/// Object service over a persistence port `P` and a task dispatch port `Q`
pub struct ObjectService<P, Q> {
    materializer: ObjectMaterializer,
    store: Arc<P>,
    queue: Arc<Q>,
    source: String,
}

impl<P, Q> ObjectService<P, Q>
where
    P: PersistencePort,
    Q: TaskDispatchPort,
{
    /// Create a new object service
    pub fn new(materializer: ObjectMaterializer, store: Arc<P>, queue: Arc<Q>) -> Self {
        Self {
            materializer,
            store,
            queue,
            source: DEFAULT_SOURCE.to_string(),
        }
    }

    /// Set the producer name stamped into task envelopes
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn materializer(&self) -> &ObjectMaterializer {
        &self.materializer
    }

    /// Create an object
    pub fn create(
        &self,
        type_name: &str,
        payload: &Value,
        caller: &CallerContext,
    ) -> CoreResult<WriteOutcome> {
        let object_type = self.resolve(type_name)?;
        let object = self
            .materializer
            .materialize(type_name, Operation::Create, payload, caller)?;

        self.store.put(
            &object,
            WriteCondition::MustNotExist,
            &WriteHints::for_type(&object_type),
        )?;

        info!(
            request_id = %caller.request_id,
            object_type = type_name,
            key = object.key(),
            version = object.version(),
            elapsed_ms = caller.elapsed_ms() as u64,
            "Object created"
        );
        Ok(self.dispatch(&object_type, TaskEvent::Created, None, object))
    }

    /// Update an object the caller last saw at `expected_version`
    pub fn update(
        &self,
        type_name: &str,
        key: &str,
        payload: &Value,
        caller: &CallerContext,
        expected_version: u64,
    ) -> CoreResult<WriteOutcome> {
        self.write_existing(type_name, key, payload, caller, expected_version, false)
    }

    /// Update on behalf of the system: every field is writable, role gates
    /// still apply
    pub fn system_update(
        &self,
        type_name: &str,
        key: &str,
        payload: &Value,
        caller: &CallerContext,
        expected_version: u64,
    ) -> CoreResult<WriteOutcome> {
        self.write_existing(type_name, key, payload, caller, expected_version, true)
    }

    /// Read an object
    pub fn get(&self, type_name: &str, key: &str) -> CoreResult<ManagedObject> {
        self.resolve(type_name)?;
        Ok(self.store.get(type_name, key)?)
    }

    /// Delete an object
    pub fn delete(&self, type_name: &str, key: &str, caller: &CallerContext) -> CoreResult<()> {
        self.resolve(type_name)?;
        self.store.delete(type_name, key)?;
        info!(
            request_id = %caller.request_id,
            object_type = type_name,
            key,
            elapsed_ms = caller.elapsed_ms() as u64,
            "Object deleted"
        );
        Ok(())
    }

    /// Render an object for a response
    pub fn render(&self, type_name: &str, object: &ManagedObject) -> CoreResult<Value> {
        let object_type = self.resolve(type_name)?;
        Ok(ResponseView::render(&object_type, object))
    }

    fn resolve(&self, type_name: &str) -> CoreResult<Arc<ObjectType>> {
        self.materializer
            .registry()
            .resolve(type_name)
            .map_err(|_| CoreError::UnknownObjectType(type_name.to_string()))
    }

    fn write_existing(
        &self,
        type_name: &str,
        key: &str,
        payload: &Value,
        caller: &CallerContext,
        expected_version: u64,
        system: bool,
    ) -> CoreResult<WriteOutcome> {
        let object_type = self.resolve(type_name)?;
        let existing = self.store.get(type_name, key)?;

        let operation = if system {
            Operation::System {
                existing: &existing,
                expected_version,
            }
        } else {
            Operation::Update {
                existing: &existing,
                expected_version,
            }
        };
        let object = self
            .materializer
            .materialize(type_name, operation, payload, caller)?;

        self.store.put(
            &object,
            WriteCondition::VersionEquals(expected_version),
            &WriteHints::for_type(&object_type),
        )?;

        info!(
            request_id = %caller.request_id,
            object_type = type_name,
            key,
            version = object.version(),
            operation = %operation.kind(),
            elapsed_ms = caller.elapsed_ms() as u64,
            "Object updated"
        );
        Ok(self.dispatch(&object_type, TaskEvent::Updated, Some(&existing), object))
    }

    /// Enqueue every task rule that fires for this write.
    fn dispatch(
        &self,
        object_type: &ObjectType,
        event: TaskEvent,
        previous: Option<&ManagedObject>,
        object: ManagedObject,
    ) -> WriteOutcome {
        let mut outcome = WriteOutcome {
            object,
            dispatched: Vec::new(),
            dispatch_failures: Vec::new(),
        };

        for rule in object_type.tasks() {
            let (before, after) = match &rule.field {
                Some(field) => (
                    previous.and_then(|p| p.field(field)),
                    outcome.object.field(field),
                ),
                None => (None, None),
            };
            if !rule.fires(event, before, after) {
                continue;
            }

            let envelope = TaskEnvelope {
                data: ResponseView::render(object_type, &outcome.object),
                metadata: TaskMetadata {
                    timestamp: Utc::now(),
                    source: self.source.clone(),
                    object_type: object_type.name().to_string(),
                    event,
                    queue: rule.queue.clone(),
                    key: outcome.object.key().to_string(),
                    version: outcome.object.version(),
                },
            };

            match self.queue.enqueue(&rule.queue, &envelope) {
                Ok(()) => outcome.dispatched.push(rule.queue.clone()),
                Err(e) => {
                    warn!(
                        queue = %rule.queue,
                        object_type = object_type.name(),
                        key = outcome.object.key(),
                        error = %e,
                        "Task dispatch failed; write already committed"
                    );
                    outcome.dispatch_failures.push(e);
                }
            }
        }

        outcome
    }
}
