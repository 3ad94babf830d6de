//! Version / Concurrency Guard
//!
//! Every object carries a version counter:
//! - `absent` → `v1` on create
//! - `vN` → `vN+1` on update, only if the caller's expected version is `N`
//!
//! The guard holds no lock. It defines the compare-and-set contract that a
//! persistence port applies atomically with the write.

mod guard;

pub use guard::{
    AdvanceError, GuardViolation, VersionConflict, VersionGuard, WriteCondition, INITIAL_VERSION,
};
