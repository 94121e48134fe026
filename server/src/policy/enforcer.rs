use std::sync::Arc;

use super::store::PolicyStore;
use super::{PolicyError, PolicyRule};

/// Answers allow/deny queries against the policy store.
///
/// Role resolution is a single hop: the subject's grouping rules name role
/// codes directly, and the subject is allowed as soon as any of those roles
/// carries a permission rule for the requested tuple.
#[derive(Clone)]
pub struct Enforcer {
    store: Arc<PolicyStore>,
}

impl Enforcer {
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self { store }
    }

    /// Whether the subject may perform the operation on the feature.
    ///
    /// Malformed input (any empty component) is never auto-allowed. A
    /// degraded store yields an error so that callers deny; decisions are
    /// only as fresh as the last successful persist.
    pub fn allowed(
        &self,
        subject: &str,
        feature_code: &str,
        operation: &str,
    ) -> Result<bool, PolicyError> {
        if self.store.is_degraded() {
            return Err(PolicyError::Unavailable);
        }

        if subject.is_empty() || feature_code.is_empty() || operation.is_empty() {
            return Ok(false);
        }

        let roles = self.store.subject_roles(subject);
        if roles.is_empty() {
            return Ok(false);
        }

        for role in roles {
            let rule = PolicyRule::new(role, feature_code, operation);
            if self.store.has_permission_rule(&rule) {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
