use std::sync::Arc;

use actix_web::HttpRequest;
use anyhow::Result;
use log::{error, info, warn};
use portal_misc::api::session::{Session, SESSION_ACTIVE, SESSION_EXPIRED};
use portal_misc::api::token::{LoginRequest, LogoutRequest, RefreshTokenRequest, TokenResponse};
use portal_misc::{code, time};
use uuid::Uuid;

use crate::context::ServerContext;
use crate::expect_json;
use crate::policy::sync;
use crate::request;
use crate::response::{self, Response};

use super::Handler;

/// Session lifecycle endpoints, exempt from the authorization middleware by
/// routing: login issues tokens and a session row, refresh rotates them,
/// logout expires the session.
pub struct LoginHandler {
    ctx: Arc<ServerContext>,
}

impl LoginHandler {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    fn handle_login(&self, req: &HttpRequest, body: String) -> Response {
        let login: LoginRequest = expect_json!(body);
        if let Err(e) = login.validate() {
            return Response::bad_request(format!("{e:#}"));
        }

        let mut inactive = false;
        let lookup: Result<Option<(String, Vec<String>)>> = self.ctx.db.with_transaction(|tx| {
            let record = match tx.get_user_by_name(&login.name)? {
                Some(record) => record,
                None => return Ok(None),
            };

            let hash = code::sha256(format!("{}{}", login.password, record.salt));
            if hash != record.hash {
                return Ok(None);
            }

            if !record.is_active {
                inactive = true;
                return Ok(None);
            }

            let roles: Vec<String> = tx
                .list_user_roles(&record.id)?
                .into_iter()
                .filter(|role| role.is_active)
                .map(|role| role.code)
                .collect();
            Ok(Some((record.id, roles)))
        });

        let (user_id, roles) = match lookup {
            Ok(Some(data)) => data,
            Ok(None) => {
                if inactive {
                    return Response::unauthorized("User account is not active");
                }
                return Response::unauthenticated("Invalid name or password");
            }
            Err(err) => {
                error!("Login database error: {err:#}");
                return Response::error(response::DATABASE_ERROR);
            }
        };

        // Login establishes the subject's grouping rules from its current
        // role set.
        if let Err(e) = sync::sync_subject_roles(&self.ctx.store, &login.name, &roles) {
            error!("Grouping sync on login for '{}' failed: {e:#}", login.name);
            return Response::error(response::POLICY_ERROR);
        }

        let now = time::current_timestamp();
        let access = match self
            .ctx
            .jwt_generator
            .generate_access_token(&login.name, roles, now)
        {
            Ok(token) => token,
            Err(e) => {
                error!("Generate access token failed: {e:#}");
                return Response::error(response::TOKEN_ERROR);
            }
        };
        let refresh = match self.ctx.jwt_generator.generate_refresh_token(&login.name, now) {
            Ok(token) => token,
            Err(e) => {
                error!("Generate refresh token failed: {e:#}");
                return Response::error(response::TOKEN_ERROR);
            }
        };

        let ip_address = request::peer_address(req).unwrap_or_else(|_| String::from("unknown"));
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            username: login.name.clone(),
            ip_address,
            started: now,
            last_access: now,
            refresh_token: refresh.token.clone(),
            status: SESSION_ACTIVE,
            create_time: now,
            update_time: now,
        };
        if let Err(err) = self.ctx.db.with_transaction(|tx| tx.create_session(&session)) {
            error!("Create session database error: {err:#}");
            return Response::error(response::DATABASE_ERROR);
        }

        info!("User '{}' logged in from {}", login.name, session.ip_address);
        Response::json(TokenResponse {
            access_token: access.token,
            access_expire: access.expire_after,
            refresh_token: refresh.token,
            refresh_expire: refresh.expire_after,
        })
    }

    fn handle_refresh(&self, body: String) -> Response {
        let req: RefreshTokenRequest = expect_json!(body);
        if req.refresh_token.is_empty() {
            return Response::bad_request("refresh_token is required");
        }

        let now = time::current_timestamp();
        let identity = match self
            .ctx
            .jwt_validator
            .validate_refresh_token(&req.refresh_token, now)
        {
            Ok(identity) => identity,
            Err(e) => return Response::unauthenticated(format!("{e:#}")),
        };

        let session = match self
            .ctx
            .db
            .with_transaction(|tx| tx.get_session_by_refresh_token(&req.refresh_token))
        {
            Ok(Some(session)) => session,
            Ok(None) => return Response::unauthenticated("Unknown refresh token"),
            Err(err) => {
                error!("Refresh database error: {err:#}");
                return Response::error(response::DATABASE_ERROR);
            }
        };
        if !session.is_active() || session.username != identity.name {
            return Response::unauthenticated("Session is no longer active");
        }

        // Roles are re-resolved on every refresh so that assignment changes
        // take effect without waiting for token expiry.
        let roles: Result<Vec<String>> = self.ctx.db.with_transaction(|tx| {
            let record = match tx.get_user_by_name(&identity.name)? {
                Some(record) => record,
                None => anyhow::bail!("user '{}' no longer exists", identity.name),
            };
            if !record.is_active {
                anyhow::bail!("user '{}' is not active", identity.name);
            }
            let roles = tx
                .list_user_roles(&record.id)?
                .into_iter()
                .filter(|role| role.is_active)
                .map(|role| role.code)
                .collect();
            Ok(roles)
        });
        let roles = match roles {
            Ok(roles) => roles,
            Err(e) => {
                warn!("Refusing token refresh: {e:#}");
                return Response::unauthenticated("User is no longer active");
            }
        };

        if let Err(e) = sync::sync_subject_roles(&self.ctx.store, &identity.name, &roles) {
            error!("Grouping sync on refresh for '{}' failed: {e:#}", identity.name);
            return Response::error(response::POLICY_ERROR);
        }

        let access = match self
            .ctx
            .jwt_generator
            .generate_access_token(&identity.name, roles, now)
        {
            Ok(token) => token,
            Err(e) => {
                error!("Generate access token failed: {e:#}");
                return Response::error(response::TOKEN_ERROR);
            }
        };
        let refresh = match self
            .ctx
            .jwt_generator
            .generate_refresh_token(&identity.name, now)
        {
            Ok(token) => token,
            Err(e) => {
                error!("Generate refresh token failed: {e:#}");
                return Response::error(response::TOKEN_ERROR);
            }
        };

        // The refresh token is rotated: the old one stops working as soon as
        // the session row points at its replacement.
        if let Err(err) = self
            .ctx
            .db
            .with_transaction(|tx| tx.rotate_session_token(&session.id, &refresh.token, now))
        {
            error!("Rotate session token database error: {err:#}");
            return Response::error(response::DATABASE_ERROR);
        }

        Response::json(TokenResponse {
            access_token: access.token,
            access_expire: access.expire_after,
            refresh_token: refresh.token,
            refresh_expire: refresh.expire_after,
        })
    }

    fn handle_logout(&self, body: String) -> Response {
        let req: LogoutRequest = expect_json!(body);
        if req.refresh_token.is_empty() {
            return Response::bad_request("refresh_token is required");
        }

        let now = time::current_timestamp();
        let mut found = false;
        let result: Result<()> = self.ctx.db.with_transaction(|tx| {
            if let Some(session) = tx.get_session_by_refresh_token(&req.refresh_token)? {
                found = true;
                tx.set_session_status(&session.id, SESSION_EXPIRED, now)?;
            }
            Ok(())
        });

        if let Err(err) = result {
            error!("Logout database error: {err:#}");
            return Response::error(response::DATABASE_ERROR);
        }
        if !found {
            return Response::not_found("Session not found");
        }

        Response::ok()
    }
}

impl Handler for LoginHandler {
    fn handle(&self, path: &str, req: HttpRequest, body: Option<Vec<u8>>) -> Response {
        let body = match body {
            Some(data) => match String::from_utf8(data) {
                Ok(body) => body,
                Err(_) => return Response::bad_request("Invalid utf-8 payload"),
            },
            None => return Response::bad_request("Request body is required"),
        };

        match path {
            "" => self.handle_login(&req, body),
            "refresh" => self.handle_refresh(body),
            "logout" => self.handle_logout(body),
            _ => Response::not_found("No such login endpoint"),
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;
    use portal_misc::api::role::Role;

    use crate::db::types::UserRecord;

    use super::*;

    fn seed_user(ctx: &ServerContext, name: &str, password: &str, active: bool) {
        ctx.db
            .with_transaction(|tx| {
                let salt = "test_salt".to_string();
                tx.create_role(&Role {
                    id: format!("role-for-{name}"),
                    name: format!("Role for {name}"),
                    code: "QA".to_string(),
                    is_active: true,
                    create_time: 1,
                    update_time: 1,
                })?;
                tx.create_user(&UserRecord {
                    id: format!("user-{name}"),
                    name: name.to_string(),
                    email: None,
                    hash: code::sha256(format!("{password}{salt}")),
                    salt,
                    is_active: active,
                    create_time: 1,
                    update_time: 1,
                })?;
                tx.create_user_role(&format!("user-{name}"), &format!("role-for-{name}"))?;
                Ok(())
            })
            .unwrap();
    }

    fn login_body(name: &str, password: &str) -> Option<Vec<u8>> {
        let body = serde_json::to_string(&LoginRequest {
            name: name.to_string(),
            password: password.to_string(),
        })
        .unwrap();
        Some(body.into_bytes())
    }

    fn token_data(resp: Response) -> TokenResponse {
        use actix_web::body::MessageBody;

        let http: actix_web::HttpResponse = resp.into();
        let bytes = http.into_body().try_into_bytes().unwrap();
        let parsed: portal_misc::api::ResourceResponse<TokenResponse> =
            serde_json::from_slice(&bytes).unwrap();
        parsed.data.unwrap()
    }

    #[test]
    fn test_login_flow() {
        let ctx = Arc::new(ServerContext::new_test());
        let handler = LoginHandler::new(ctx.clone());
        seed_user(&ctx, "user123", "secret123", true);

        let req = TestRequest::default()
            .peer_addr("10.1.2.3:4567".parse().unwrap())
            .to_http_request();
        let resp = handler.handle("", req.clone(), login_body("user123", "secret123"));
        assert_eq!(resp.status(), StatusCode::OK);

        // Login grouped the subject into its roles.
        assert!(ctx.store.subject_roles("user123").contains("QA"));

        // Wrong password and unknown user are authentication failures.
        let resp = handler.handle("", req.clone(), login_body("user123", "wrong"));
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let resp = handler.handle("", req, login_body("ghost", "secret123"));
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_login_inactive_user() {
        let ctx = Arc::new(ServerContext::new_test());
        let handler = LoginHandler::new(ctx.clone());
        seed_user(&ctx, "dormant", "secret123", false);

        let req = TestRequest::default()
            .peer_addr("10.1.2.3:4567".parse().unwrap())
            .to_http_request();
        let resp = handler.handle("", req, login_body("dormant", "secret123"));
        // Valid identity, refused access: forbidden, not unauthenticated.
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_refresh_and_logout() {
        let ctx = Arc::new(ServerContext::new_test());
        let handler = LoginHandler::new(ctx.clone());
        seed_user(&ctx, "user123", "secret123", true);

        let req = TestRequest::default()
            .peer_addr("10.1.2.3:4567".parse().unwrap())
            .to_http_request();
        let resp = handler.handle("", req.clone(), login_body("user123", "secret123"));
        let tokens = token_data(resp);

        // Refresh rotates the refresh token.
        let body = serde_json::to_string(&RefreshTokenRequest {
            refresh_token: tokens.refresh_token.clone(),
        })
        .unwrap();
        let resp = handler.handle("refresh", req.clone(), Some(body.clone().into_bytes()));
        assert_eq!(resp.status(), StatusCode::OK);
        let rotated = token_data(resp);
        assert_ne!(rotated.refresh_token, tokens.refresh_token);

        // The old refresh token no longer matches any session.
        let resp = handler.handle("refresh", req.clone(), Some(body.into_bytes()));
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        // Logout expires the session; further refreshes are refused.
        let body = serde_json::to_string(&LogoutRequest {
            refresh_token: rotated.refresh_token.clone(),
        })
        .unwrap();
        let resp = handler.handle("logout", req.clone(), Some(body.into_bytes()));
        assert_eq!(resp.status(), StatusCode::OK);

        let body = serde_json::to_string(&RefreshTokenRequest {
            refresh_token: rotated.refresh_token,
        })
        .unwrap();
        let resp = handler.handle("refresh", req, Some(body.into_bytes()));
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
