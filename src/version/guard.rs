//! Version guard - optimistic concurrency rules
//!
//! First conflicting writer wins: a write built against a stale version is
//! rejected, never silently applied over the newer one.

use std::fmt;

use thiserror::Error;

/// Version assigned by every create.
pub const INITIAL_VERSION: u64 = 1;

/// Caller's expected version did not match the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Version conflict: expected version {expected}, current version is {actual}")]
pub struct VersionConflict {
    /// Version the caller built its update against
    pub expected: u64,
    /// Version currently stored
    pub actual: u64,
}

/// Precondition a store checks atomically with a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    /// Create: no object may exist under the same type and key
    MustNotExist,
    /// Update: the stored version must equal this value
    VersionEquals(u64),
}

impl WriteCondition {
    /// Maps an optional expected version to a condition.
    ///
    /// `None` is a create.
    pub fn from_expected(expected: Option<u64>) -> Self {
        match expected {
            None => WriteCondition::MustNotExist,
            Some(version) => WriteCondition::VersionEquals(version),
        }
    }

    /// Version the written object must carry, or `None` once the expected
    /// version is `u64::MAX`.
    pub fn next_version(&self) -> Option<u64> {
        match self {
            WriteCondition::MustNotExist => Some(INITIAL_VERSION),
            WriteCondition::VersionEquals(version) => version.checked_add(1),
        }
    }
}

impl fmt::Display for WriteCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteCondition::MustNotExist => write!(f, "must-not-exist"),
            WriteCondition::VersionEquals(v) => write!(f, "version={}", v),
        }
    }
}

/// Why a version could not be advanced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdvanceError {
    #[error(transparent)]
    Conflict(#[from] VersionConflict),

    #[error("Version {0} is the last representable version")]
    Exhausted(u64),
}

/// Why a store must refuse a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardViolation {
    /// Create against an existing key
    AlreadyExists,
    /// Update against a missing object
    Missing,
    /// Update against a different version
    Conflict(VersionConflict),
    /// Written object does not carry the version the condition implies
    InvalidTransition { expected: u64, written: u64 },
    /// Stored version cannot be advanced
    Exhausted(u64),
}

impl From<AdvanceError> for GuardViolation {
    fn from(err: AdvanceError) -> Self {
        match err {
            AdvanceError::Conflict(conflict) => GuardViolation::Conflict(conflict),
            AdvanceError::Exhausted(version) => GuardViolation::Exhausted(version),
        }
    }
}

/// Optimistic concurrency rules.
pub struct VersionGuard;

impl VersionGuard {
    /// Version for a newly created object.
    pub fn initial() -> u64 {
        INITIAL_VERSION
    }

    /// Next version for an update, or a conflict if `expected` is stale.
    pub fn advance(current: u64, expected: u64) -> Result<u64, AdvanceError> {
        if current != expected {
            return Err(VersionConflict {
                expected,
                actual: current,
            }
            .into());
        }
        current
            .checked_add(1)
            .ok_or(AdvanceError::Exhausted(current))
    }

    /// Decides whether a store may apply a write.
    ///
    /// `stored` is the version currently held for the same type and key,
    /// `written` the version carried by the object being written. Stores must
    /// call this and apply the write under the same critical section.
    pub fn admit(
        condition: WriteCondition,
        stored: Option<u64>,
        written: u64,
    ) -> Result<(), GuardViolation> {
        match (condition, stored) {
            (WriteCondition::MustNotExist, Some(_)) => return Err(GuardViolation::AlreadyExists),
            (WriteCondition::VersionEquals(_), None) => return Err(GuardViolation::Missing),
            (WriteCondition::VersionEquals(expected), Some(current)) => {
                Self::advance(current, expected)?;
            }
            (WriteCondition::MustNotExist, None) => {}
        }

        // Only `VersionEquals(u64::MAX)` has no successor
        let Some(expected) = condition.next_version() else {
            return Err(GuardViolation::Exhausted(u64::MAX));
        };
        if written != expected {
            return Err(GuardViolation::InvalidTransition { expected, written });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_starts_at_one() {
        assert_eq!(VersionGuard::initial(), 1);
        assert_eq!(WriteCondition::MustNotExist.next_version(), Some(1));
    }

    #[test]
    fn test_advance_increments_on_match() {
        assert_eq!(VersionGuard::advance(3, 3), Ok(4));
    }

    #[test]
    fn test_advance_rejects_stale_version() {
        let err = VersionGuard::advance(4, 3).unwrap_err();
        assert_eq!(err, AdvanceError::Conflict(VersionConflict { expected: 3, actual: 4 }));
        assert!(err.to_string().contains("expected version 3"));
    }

    #[test]
    fn test_advance_stops_at_max_version() {
        assert_eq!(VersionGuard::advance(u64::MAX - 1, u64::MAX - 1), Ok(u64::MAX));
        assert_eq!(
            VersionGuard::advance(u64::MAX, u64::MAX),
            Err(AdvanceError::Exhausted(u64::MAX))
        );
        assert_eq!(WriteCondition::VersionEquals(u64::MAX).next_version(), None);
        assert_eq!(
            VersionGuard::admit(WriteCondition::VersionEquals(u64::MAX), Some(u64::MAX), 0),
            Err(GuardViolation::Exhausted(u64::MAX))
        );
    }

    #[test]
    fn test_admit_create() {
        assert!(VersionGuard::admit(WriteCondition::MustNotExist, None, 1).is_ok());
        assert_eq!(
            VersionGuard::admit(WriteCondition::MustNotExist, Some(1), 1),
            Err(GuardViolation::AlreadyExists)
        );
    }

    #[test]
    fn test_admit_update() {
        assert!(VersionGuard::admit(WriteCondition::VersionEquals(2), Some(2), 3).is_ok());
        assert_eq!(
            VersionGuard::admit(WriteCondition::VersionEquals(2), Some(3), 3),
            Err(GuardViolation::Conflict(VersionConflict { expected: 2, actual: 3 }))
        );
        assert_eq!(
            VersionGuard::admit(WriteCondition::VersionEquals(2), None, 3),
            Err(GuardViolation::Missing)
        );
    }

    #[test]
    fn test_admit_rejects_skipped_versions() {
        assert_eq!(
            VersionGuard::admit(WriteCondition::VersionEquals(2), Some(2), 5),
            Err(GuardViolation::InvalidTransition { expected: 3, written: 5 })
        );
    }

    #[test]
    fn test_condition_from_expected() {
        assert_eq!(WriteCondition::from_expected(None), WriteCondition::MustNotExist);
        assert_eq!(
            WriteCondition::from_expected(Some(7)),
            WriteCondition::VersionEquals(7)
        );
    }
}
