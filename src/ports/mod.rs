//! Ports: what the engine needs from the outside world
//!
//! Both ports are synchronous traits. Implementations own their own
//! atomicity and retries.

mod dispatch;
mod memory;
mod persistence;

pub use dispatch::{DispatchError, TaskDispatchPort, TaskEnvelope, TaskMetadata};
pub use memory::{InMemoryQueue, InMemoryStore};
pub use persistence::{PersistencePort, StoreError, StoreResult, WriteHints};
