//! Managed objects
//!
//! A managed object is a payload that passed every field rule of its object
//! type and carries the system-owned attributes (`_id`, `key`, audit
//! stamps, `version`). Objects are only ever built by the materializer.

mod errors;
mod managed;
mod materializer;
mod view;

pub use errors::{MaterializeError, MaterializeResult};
pub use managed::{is_system_attribute, ManagedObject, SystemAttributes, SYSTEM_ATTRIBUTES};
pub use materializer::{ObjectMaterializer, Operation, UnknownFieldPolicy, DEFAULT_MAX_PAYLOAD_FIELDS};
pub use view::ResponseView;
