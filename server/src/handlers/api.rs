use std::sync::Arc;

use actix_web::HttpRequest;
use log::{error, warn};
use portal_misc::api::user::WhoamiResponse;

use crate::auth::{self, AuthnUserInfo};
use crate::authz::chain::ChainAuthorizer;
use crate::authz::{
    AdminAuthorizer, Authorizer, AuthzRequest, AuthzResponse, PolicyAuthorizer, UnionAuthorizer,
};
use crate::context::ServerContext;
use crate::request;
use crate::response::{self, Response};

use super::resources::dispatch::Dispatcher;
use super::resources::ResourceRequest;
use super::Handler;

/// Gate and dispatcher for every request under the protected api scope:
/// authentication first (missing identity is a distinct 401), then the
/// authorization chain (super-admin bypass, then the policy enforcer), then
/// the resource handler.
pub struct ApiHandler {
    ctx: Arc<ServerContext>,
    authz: ChainAuthorizer,
    dispatcher: Dispatcher,
}

impl ApiHandler {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        if !ctx.cfg.authz.enforce {
            warn!(
                "Authorization enforcement is DISABLED; every authenticated request will be \
                 allowed. This is for local development only"
            );
        }

        let authz = ChainAuthorizer::new(vec![
            UnionAuthorizer::Admin(AdminAuthorizer::new()),
            UnionAuthorizer::Policy(PolicyAuthorizer::new(
                ctx.enforcer.clone(),
                ctx.routes.clone(),
            )),
        ]);
        let dispatcher = Dispatcher::new(&ctx);

        Self {
            ctx,
            authz,
            dispatcher,
        }
    }

    fn split_api_path(path: &str) -> Result<(String, Option<String>), &'static str> {
        let path = path.trim_end_matches('/');

        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            [] => Err("empty path"),
            [""] => Err("empty resource"),
            [resource] => Ok((resource.to_string(), None)),
            [resource, id] => Ok((resource.to_string(), Some(id.to_string()))),
            _ => Err("invalid path format"),
        }
    }

    fn handle_whoami(&self, user: AuthnUserInfo) -> Response {
        Response::json(WhoamiResponse {
            name: user.name,
            roles: user.roles,
        })
    }
}

impl Handler for ApiHandler {
    fn handle(&self, path: &str, req: HttpRequest, body: Option<Vec<u8>>) -> Response {
        let user = match auth::auth_request_raw(&self.ctx.jwt_validator, &req) {
            auth::AuthResult::Ok(user) => user,
            auth::AuthResult::Failed(msg) => return Response::unauthenticated(msg),
        };

        let method = req.method().as_str().to_lowercase();

        let (resource, id) = match Self::split_api_path(path) {
            Ok((resource, id)) => (resource, id),
            Err(msg) => return Response::bad_request(msg),
        };

        // Identity echo for authenticated callers; carries no policy
        // decision, so it sits outside the authorization chain.
        if resource == "whoami" {
            if id.is_some() {
                return Response::bad_request("whoami does not take an id");
            }
            if method != "get" {
                return Response::method_not_allowed();
            }
            return self.handle_whoami(user);
        }

        let body = match body {
            Some(data) => match String::from_utf8(data) {
                Ok(body) => Some(body),
                Err(_) => return Response::bad_request("Invalid utf-8 payload"),
            },
            None => None,
        };

        let rsc_req = match method.as_str() {
            "get" => match id {
                Some(id) => ResourceRequest::Get(id),
                None => {
                    let query = match request::parse_query(&req) {
                        Ok(query) => query,
                        Err(e) => return Response::bad_request(format!("{e:#}")),
                    };
                    ResourceRequest::List(query)
                }
            },
            "put" => match body {
                Some(body) => ResourceRequest::Put(body),
                None => return Response::bad_request("Request body is required"),
            },
            "patch" => match (id, body) {
                (Some(id), Some(body)) => ResourceRequest::Patch(id, body),
                (None, _) => return Response::bad_request("Resource id is required"),
                (_, None) => return Response::bad_request("Request body is required"),
            },
            "delete" => ResourceRequest::Delete(id, body),
            _ => return Response::method_not_allowed(),
        };

        // The enforcement switch exists for local development only; the
        // authenticated identity is still required above.
        if self.ctx.cfg.authz.enforce {
            let authz_req = AuthzRequest {
                resource: resource.clone(),
                verb: String::from(rsc_req.verb()),
                user: user.clone(),
            };
            let authz_resp = match self.authz.authorize_request(&authz_req) {
                Ok(resp) => resp,
                Err(e) => {
                    error!("Authorization failed: {e:#}");
                    return Response::error(response::AUTHZ_ERROR);
                }
            };
            if !matches!(authz_resp, AuthzResponse::Ok) {
                return Response::unauthorized("Permission denied");
            }
        }

        self.dispatcher.dispatch(rsc_req, &resource, user)
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;
    use chrono::Utc;
    use portal_misc::api;
    use portal_misc::api::role::{Role, ADMIN_ROLE_CODE};

    use crate::policy::sync;

    use super::*;

    fn seed_role(ctx: &ServerContext, id: &str, code: &str) {
        ctx.db
            .with_transaction(|tx| {
                tx.create_role(&Role {
                    id: id.to_string(),
                    name: format!("{code} role"),
                    code: code.to_string(),
                    is_active: true,
                    create_time: 1,
                    update_time: 1,
                })
            })
            .unwrap();
    }

    fn bearer(ctx: &ServerContext, name: &str, roles: &[&str]) -> String {
        let now = Utc::now().timestamp() as u64;
        let token = ctx
            .jwt_generator
            .generate_access_token(name, roles.iter().map(|r| r.to_string()).collect(), now)
            .unwrap();
        format!("Bearer {}", token.token)
    }

    fn api_request(method: &str, uri: &str, auth: Option<&str>) -> HttpRequest {
        let mut req = TestRequest::with_uri(uri).method(method.parse().unwrap());
        if let Some(auth) = auth {
            req = req.insert_header((api::HEADER_AUTHORIZATION, auth));
        }
        req.to_http_request()
    }

    #[test]
    fn test_unauthenticated_vs_forbidden() {
        let ctx = Arc::new(ServerContext::new_test());
        let handler = ApiHandler::new(ctx.clone());

        // No credentials: 401, telling the caller to log in again.
        let req = api_request("GET", "/api/roles", None);
        let resp = handler.handle("roles", req, None);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        // Valid identity without policy: 403, telling the caller to ask an
        // admin.
        let auth = bearer(&ctx, "user123", &["QA"]);
        let req = api_request("GET", "/api/roles", Some(&auth));
        let resp = handler.handle("roles", req, None);
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_super_admin_bypasses_policy() {
        let ctx = Arc::new(ServerContext::new_test());
        let handler = ApiHandler::new(ctx.clone());

        let auth = bearer(&ctx, "root", &[ADMIN_ROLE_CODE]);
        let req = api_request("GET", "/api/roles", Some(&auth));
        let resp = handler.handle("roles", req, None);
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn test_policy_grant_allows() {
        let ctx = Arc::new(ServerContext::new_test());
        let handler = ApiHandler::new(ctx.clone());
        seed_role(&ctx, "role-qa", "QA");

        ctx.store
            .grant(vec![crate::policy::PolicyRule::new(
                "QA",
                "ROLE",
                "list_roles",
            )])
            .unwrap();
        sync::sync_subject_roles(&ctx.store, "user123", &["QA".to_string()]).unwrap();

        let auth = bearer(&ctx, "user123", &["QA"]);
        let req = api_request("GET", "/api/roles", Some(&auth));
        let resp = handler.handle("roles", req, None);
        assert_eq!(resp.status(), StatusCode::OK);

        // The grant does not leak onto other verbs of the same resource.
        let req = api_request("DELETE", "/api/roles/role-qa", Some(&auth));
        let resp = handler.handle("roles/role-qa", req, None);
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_unregistered_resource_denied() {
        let ctx = Arc::new(ServerContext::new_test());
        let handler = ApiHandler::new(ctx.clone());

        // Even a broadly granted subject is denied on a resource that is
        // not in the declared route table.
        ctx.store
            .grant(vec![crate::policy::PolicyRule::new(
                "QA",
                "PROJECT",
                "list_projects",
            )])
            .unwrap();
        sync::sync_subject_roles(&ctx.store, "user123", &["QA".to_string()]).unwrap();

        let auth = bearer(&ctx, "user123", &["QA"]);
        let req = api_request("GET", "/api/projects", Some(&auth));
        let resp = handler.handle("projects", req, None);
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_enforcement_switch_disabled() {
        let mut ctx = ServerContext::new_test();
        ctx.cfg.authz.enforce = false;
        let ctx = Arc::new(ctx);
        let handler = ApiHandler::new(ctx.clone());

        // Any authenticated request passes without policy rules.
        let auth = bearer(&ctx, "user123", &["QA"]);
        let req = api_request("GET", "/api/roles", Some(&auth));
        let resp = handler.handle("roles", req, None);
        assert_eq!(resp.status(), StatusCode::OK);

        // Authentication is still required.
        let req = api_request("GET", "/api/roles", None);
        let resp = handler.handle("roles", req, None);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_whoami() {
        let ctx = Arc::new(ServerContext::new_test());
        let handler = ApiHandler::new(ctx.clone());

        let auth = bearer(&ctx, "user123", &["QA"]);
        let req = api_request("GET", "/api/whoami", Some(&auth));
        let resp = handler.handle("whoami", req, None);
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
