mod features;
mod operations;
mod permissions;
mod roles;
mod sessions;
mod union;
mod users;

pub mod dispatch;

use portal_misc::api::Query;

use crate::auth::AuthnUserInfo;
use crate::response::Response;

/// A typed resource request, produced by the api handler from the HTTP
/// method and path shape.
#[derive(Debug)]
pub enum ResourceRequest {
    /// Create or replace, with a json payload.
    Put(String),
    /// Partial update of one resource by id, with a json payload.
    Patch(String, String),
    /// List with the common query.
    List(Query),
    /// Fetch one resource by id.
    Get(String),
    /// Delete by id, or by a json payload when the resource supports bulk
    /// deletion.
    Delete(Option<String>, Option<String>),
}

impl ResourceRequest {
    pub fn verb(&self) -> &'static str {
        match self {
            ResourceRequest::Put(_) => crate::routes::VERB_PUT,
            ResourceRequest::Patch(_, _) => crate::routes::VERB_PATCH,
            ResourceRequest::List(_) => crate::routes::VERB_LIST,
            ResourceRequest::Get(_) => crate::routes::VERB_GET,
            ResourceRequest::Delete(_, _) => crate::routes::VERB_DELETE,
        }
    }
}

pub trait ResourceHandler: Send + Sync {
    fn put(&self, body: String, user: AuthnUserInfo) -> Response;
    fn patch(&self, id: String, body: String, user: AuthnUserInfo) -> Response;
    fn list(&self, query: Query, user: AuthnUserInfo) -> Response;
    fn get(&self, id: String, user: AuthnUserInfo) -> Response;
    fn delete(&self, id: Option<String>, body: Option<String>, user: AuthnUserInfo) -> Response;
}

#[macro_export]
macro_rules! expect_json {
    ($body:expr) => {
        match serde_json::from_str(&$body) {
            Ok(obj) => obj,
            Err(_) => {
                return $crate::response::Response::bad_request("Invalid json payload");
            }
        }
    };
}
