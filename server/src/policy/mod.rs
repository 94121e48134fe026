pub mod enforcer;
pub mod store;
pub mod sync;

use std::fmt;

use thiserror::Error;

/// A (role, feature, operation) permission tuple. The tuple itself is the
/// identity of the rule; there is no other key.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct PolicyRule {
    pub role: String,
    pub feature: String,
    pub operation: String,
}

impl PolicyRule {
    pub fn new(
        role: impl ToString,
        feature: impl ToString,
        operation: impl ToString,
    ) -> Self {
        Self {
            role: role.to_string(),
            feature: feature.to_string(),
            operation: operation.to_string(),
        }
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.role, self.feature, self.operation)
    }
}

/// Which side of the permission mirror holds stale data after a partial
/// failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StaleSide {
    /// The policy store missed a change the permission table committed.
    PolicyStore,
    /// The permission table lacks a row whose rule is still in the store.
    PermissionTable,
}

impl fmt::Display for StaleSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleSide::PolicyStore => write!(f, "policy store"),
            StaleSide::PermissionTable => write!(f, "permission table"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    /// The store failed to load or persist. Every enforcement check must
    /// deny until a resync succeeds; never fail open.
    #[error("policy store unavailable, denying all requests until resync")]
    Unavailable,

    /// The permission table and the policy store disagree after a partial
    /// failure. Carries enough detail to drive a reconciliation pass.
    #[error("policy rule {rule} is stale on the {side}, full resync required")]
    Inconsistency { rule: PolicyRule, side: StaleSide },
}
