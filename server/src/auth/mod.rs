pub mod jwt;

use actix_web::HttpRequest;
use portal_misc::api;
use portal_misc::api::role::ADMIN_ROLE_CODE;
use portal_misc::time;

use jwt::JwtTokenValidator;

/// Information about an authenticated subject, as established by the token
/// layer. The role codes were resolved at login time and travel inside the
/// access token; the enforcer treats them as ground truth.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthnUserInfo {
    /// Subject identifier (user name)
    pub name: String,
    /// Role codes established at login
    pub roles: Vec<String>,
    /// Whether the role set carries the super-admin marker
    pub is_admin: bool,
}

impl AuthnUserInfo {
    pub fn new(name: String, roles: Vec<String>) -> Self {
        let is_admin = roles.iter().any(|r| r == ADMIN_ROLE_CODE);
        Self {
            name,
            roles,
            is_admin,
        }
    }
}

pub enum AuthResult {
    Ok(AuthnUserInfo),
    Failed(String),
}

impl AuthResult {
    fn failed(msg: impl ToString) -> Self {
        Self::Failed(msg.to_string())
    }
}

/// Resolves the caller identity from the Authorization header. A missing or
/// invalid credential is an authentication failure, reported distinctly from
/// a policy denial.
pub fn auth_request_raw(validator: &JwtTokenValidator, req: &HttpRequest) -> AuthResult {
    let auth_header = match req.headers().get(api::HEADER_AUTHORIZATION) {
        Some(header) => match header.to_str() {
            Ok(s) => s.to_string(),
            Err(_) => return AuthResult::failed("invalid authorization header value"),
        },
        None => return AuthResult::failed("missing authorization"),
    };

    let fields = auth_header.split_whitespace().collect::<Vec<&str>>();
    if fields.len() != 2 {
        return AuthResult::failed("invalid authorization header format");
    }

    let auth_type = fields[0];
    let token = fields[1];

    if !auth_type.eq_ignore_ascii_case("bearer") {
        return AuthResult::failed("unsupported authorization type");
    }

    let now = time::current_timestamp();
    match validator.validate_access_token(token, now) {
        Ok(identity) => AuthResult::Ok(AuthnUserInfo::new(identity.name, identity.roles)),
        Err(e) => AuthResult::Failed(format!("bearer token auth failed: {e:#}")),
    }
}
