use anyhow::Result;

use super::admin::AdminAuthorizer;
use super::policy::PolicyAuthorizer;
use super::{Authorizer, AuthzRequest, AuthzResponse};

/// A union type that can hold different types of authorizers
pub enum UnionAuthorizer {
    /// Handles authorization for super-admin users
    Admin(AdminAuthorizer),
    /// Handles authorization through the policy enforcer
    Policy(PolicyAuthorizer),
}

impl Authorizer for UnionAuthorizer {
    fn authorize_request(&self, req: &AuthzRequest) -> Result<AuthzResponse> {
        match self {
            UnionAuthorizer::Admin(a) => a.authorize_request(req),
            UnionAuthorizer::Policy(p) => p.authorize_request(req),
        }
    }
}
