use actix_web::HttpRequest;
use portal_misc::api::HealthResponse;
use portal_misc::time;

use crate::response::Response;

use super::Handler;

pub struct HealthzHandler;

impl HealthzHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for HealthzHandler {
    fn handle(&self, _path: &str, _req: HttpRequest, _body: Option<Vec<u8>>) -> Response {
        Response::json(HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: time::current_timestamp(),
        })
    }
}
