pub mod api;
pub mod healthz;
pub mod login;
pub mod resources;

use actix_web::HttpRequest;

use crate::response::Response;

/// A top level request handler bound to one server scope.
pub trait Handler {
    fn handle(&self, path: &str, req: HttpRequest, body: Option<Vec<u8>>) -> Response;
}
