use std::sync::Arc;

use anyhow::Result;
use log::{error, warn};

use crate::policy::enforcer::Enforcer;
use crate::routes::RouteTable;

use super::{Authorizer, AuthzRequest, AuthzResponse};

/// An authorizer backed by the policy enforcer
///
/// Resolves the target feature code and operation from the declared route
/// table and asks the enforcer whether the subject's role set allows the
/// tuple. Every failure path denies: a route without metadata, an
/// unavailable policy store and an enforcer error all yield Unauthorized,
/// never an implicit allow.
pub struct PolicyAuthorizer {
    enforcer: Enforcer,
    routes: Arc<RouteTable>,
}

impl PolicyAuthorizer {
    pub fn new(enforcer: Enforcer, routes: Arc<RouteTable>) -> Self {
        Self { enforcer, routes }
    }
}

impl Authorizer for PolicyAuthorizer {
    fn authorize_request(&self, req: &AuthzRequest) -> Result<AuthzResponse> {
        let meta = match self.routes.lookup(&req.resource, &req.verb) {
            Some(meta) => meta,
            None => {
                warn!(
                    "Denying {} {} for '{}': route carries no authorization metadata",
                    req.verb, req.resource, req.user.name
                );
                return Ok(AuthzResponse::Unauthorized);
            }
        };

        match self
            .enforcer
            .allowed(&req.user.name, meta.feature_code, meta.operation)
        {
            Ok(true) => Ok(AuthzResponse::Ok),
            Ok(false) => Ok(AuthzResponse::Unauthorized),
            Err(e) => {
                error!(
                    "Enforcer error for ({}, {}, {}), denying: {e}",
                    req.user.name, meta.feature_code, meta.operation
                );
                Ok(AuthzResponse::Unauthorized)
            }
        }
    }
}
