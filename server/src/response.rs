use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use portal_misc::api::{CommonResponse, ResourceResponse};
use serde::{de::DeserializeOwned, Serialize};

pub const AUTHN_ERROR: &str = "Authentication failed";
pub const AUTHZ_ERROR: &str = "Authorization failed";
pub const DATABASE_ERROR: &str = "Database error";
pub const TOKEN_ERROR: &str = "Generate token failed";
pub const POLICY_ERROR: &str = "Policy synchronization failed";

/// A wrapper struct for HTTP responses that provides convenient methods
/// for creating common response types
pub struct Response {
    http_response: HttpResponse,
}

impl Response {
    pub fn not_found(message: impl AsRef<str>) -> Self {
        Self::err_response(StatusCode::NOT_FOUND, message.as_ref().to_string())
    }

    pub fn bad_request(message: impl AsRef<str>) -> Self {
        let message = format!("Bad request: {}", message.as_ref());
        Self::err_response(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl AsRef<str>) -> Self {
        let message = format!("Conflict: {}", message.as_ref());
        Self::err_response(StatusCode::CONFLICT, message)
    }

    pub fn unauthenticated(message: impl AsRef<str>) -> Self {
        let message = format!("Unauthenticated: {}", message.as_ref());
        Self::err_response(StatusCode::UNAUTHORIZED, message)
    }

    pub fn unauthorized(message: &str) -> Self {
        let message = format!("Unauthorized: {message}");
        Self::err_response(StatusCode::FORBIDDEN, message)
    }

    pub fn method_not_allowed() -> Self {
        Self::err_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
        )
    }

    pub fn error(message: &str) -> Self {
        let message = format!("Server error: {message}");
        Self::err_response(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn ok() -> Self {
        let resp = CommonResponse {
            code: StatusCode::OK.as_u16() as u32,
            message: None,
        };
        Self {
            http_response: HttpResponse::Ok().json(resp),
        }
    }

    pub fn json<T: Serialize + DeserializeOwned>(data: T) -> Self {
        let resp = ResourceResponse::<T> {
            code: StatusCode::OK.as_u16() as u32,
            message: None,
            data: Some(data),
        };
        Self {
            http_response: HttpResponse::Ok().json(resp),
        }
    }

    fn err_response(status: StatusCode, message: String) -> Self {
        let resp = CommonResponse {
            code: status.as_u16() as u32,
            message: Some(message),
        };
        Self {
            http_response: HttpResponseBuilder::new(status).json(resp),
        }
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.http_response.status()
    }
}

impl From<Response> for HttpResponse {
    fn from(val: Response) -> Self {
        val.http_response
    }
}
