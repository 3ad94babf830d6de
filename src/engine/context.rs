//! Caller Context
//!
//! Identity and roles of the caller, trusted verbatim from whatever
//! authenticated the request upstream.

use std::collections::BTreeSet;
use std::time::Instant;

use uuid::Uuid;

/// Identity carried through materialization and persistence
#[derive(Debug, Clone)]
pub struct CallerContext {
    /// Request ID for tracing
    pub request_id: Uuid,

    /// Caller identity, stamped into `created_user` / `updated_user`
    pub identity: String,

    /// Roles checked against field role gates
    pub roles: BTreeSet<String>,

    started_at: Instant,
}

impl CallerContext {
    /// Create a context for a caller with no roles
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            identity: identity.into(),
            roles: BTreeSet::new(),
            started_at: Instant::now(),
        }
    }

    /// Create a context with the given roles
    pub fn with_roles<I, S>(identity: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ctx = Self::new(identity);
        ctx.roles = roles.into_iter().map(Into::into).collect();
        ctx
    }

    /// Add a role
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Check if the caller holds a role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}
