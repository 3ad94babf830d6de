//! In-memory ports
//!
//! Reference implementations of both ports, used by tests and the CLI.
//! `InMemoryStore` runs the version guard and the write under one write
//! lock, which is the whole compare-and-set contract.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use serde_json::Value;
use tracing::debug;

use super::dispatch::{DispatchError, TaskDispatchPort, TaskEnvelope};
use super::persistence::{PersistencePort, StoreError, StoreResult, WriteHints};
use crate::object::ManagedObject;
use crate::version::{GuardViolation, VersionGuard, WriteCondition};

type ObjectKey = (String, String);

/// Thread-safe in-memory object store
#[derive(Debug)]
pub struct InMemoryStore {
    objects: RwLock<HashMap<ObjectKey, ManagedObject>>,
    available: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: every call fails with `Unavailable` while false
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store switched off".into()))
        }
    }
}

fn guard_error(violation: GuardViolation, object: &ManagedObject) -> StoreError {
    match violation {
        GuardViolation::AlreadyExists => {
            StoreError::duplicate_key(object.object_type(), object.key())
        }
        GuardViolation::Missing => StoreError::not_found(object.object_type(), object.key()),
        GuardViolation::Conflict(conflict) => StoreError::VersionConflict(conflict),
        GuardViolation::InvalidTransition { expected, written } => StoreError::InvalidWrite(
            format!("expected version {}, object carries {}", expected, written),
        ),
        GuardViolation::Exhausted(version) => {
            StoreError::InvalidWrite(format!("version {} cannot be advanced", version))
        }
    }
}

/// Unique fields of `object` whose value another object of its type holds.
fn taken_unique_fields(
    objects: &HashMap<ObjectKey, ManagedObject>,
    object: &ManagedObject,
    hints: &WriteHints,
) -> Vec<String> {
    hints
        .unique
        .iter()
        .filter(|field| {
            let value = match object.field(field) {
                None | Some(Value::Null) => return false,
                Some(value) => value,
            };
            objects.values().any(|other| {
                other.object_type() == object.object_type()
                    && other.key() != object.key()
                    && other.field(field) == Some(value)
            })
        })
        .cloned()
        .collect()
}

impl PersistencePort for InMemoryStore {
    fn get(&self, object_type: &str, key: &str) -> StoreResult<ManagedObject> {
        self.check_available()?;
        let objects = self
            .objects
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        objects
            .get(&(object_type.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(object_type, key))
    }

    fn put(
        &self,
        object: &ManagedObject,
        condition: WriteCondition,
        hints: &WriteHints,
    ) -> StoreResult<()> {
        self.check_available()?;
        let mut objects = self
            .objects
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let id = (object.object_type().to_string(), object.key().to_string());
        let stored = objects.get(&id).map(ManagedObject::version);
        VersionGuard::admit(condition, stored, object.version())
            .map_err(|violation| guard_error(violation, object))?;

        let taken = taken_unique_fields(&objects, object, hints);
        if !taken.is_empty() {
            return Err(StoreError::UniqueViolation { fields: taken });
        }

        debug!(
            object_type = object.object_type(),
            key = object.key(),
            version = object.version(),
            condition = %condition,
            "Stored object"
        );
        objects.insert(id, object.clone());
        Ok(())
    }

    fn delete(&self, object_type: &str, key: &str) -> StoreResult<()> {
        self.check_available()?;
        let mut objects = self
            .objects
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        objects
            .remove(&(object_type.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(object_type, key))
    }
}

/// In-memory queue sink that records envelopes per queue
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, Vec<TaskEnvelope>>>,
    failing: AtomicBool,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every enqueue fail while true
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Envelopes enqueued onto `queue`, oldest first
    pub fn messages(&self, queue: &str) -> Vec<TaskEnvelope> {
        let queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        queues.get(queue).cloned().unwrap_or_default()
    }

    /// Envelopes across all queues
    pub fn total(&self) -> usize {
        let queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        queues.values().map(Vec::len).sum()
    }
}

impl TaskDispatchPort for InMemoryQueue {
    fn enqueue(&self, queue: &str, envelope: &TaskEnvelope) -> Result<(), DispatchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DispatchError::failed(queue, "queue switched to failing"));
        }
        let mut queues = self
            .queues
            .lock()
            .map_err(|e| DispatchError::failed(queue, e.to_string()))?;
        queues
            .entry(queue.to_string())
            .or_default()
            .push(envelope.clone());
        Ok(())
    }
}
