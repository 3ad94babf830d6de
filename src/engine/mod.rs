//! Engine
//!
//! Request-level orchestration: caller context, the object service, and the
//! error type every service operation returns.

mod context;
mod error;
mod service;

pub use context::CallerContext;
pub use error::{CoreError, CoreResult};
pub use service::{ObjectService, WriteOutcome, DEFAULT_SOURCE};
