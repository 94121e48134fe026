use anyhow::Result;

use super::{Authorizer, AuthzRequest, AuthzResponse};

/// An authorizer that grants access to super-admin users
///
/// If the caller's established role set carries the super-admin marker the
/// request is allowed unconditionally; otherwise the decision is deferred to
/// the next authorizer.
pub struct AdminAuthorizer;

impl AdminAuthorizer {
    pub fn new() -> Self {
        Self
    }
}

impl Authorizer for AdminAuthorizer {
    fn authorize_request(&self, req: &AuthzRequest) -> Result<AuthzResponse> {
        if req.user.is_admin {
            return Ok(AuthzResponse::Ok);
        }

        Ok(AuthzResponse::Continue)
    }
}
