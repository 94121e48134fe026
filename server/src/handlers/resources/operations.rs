use std::sync::Arc;

use log::error;
use portal_misc::api::Query;

use crate::auth::AuthnUserInfo;
use crate::db::Database;
use crate::response::{self, Response};

use super::ResourceHandler;

/// Read-only view over the operation registry. Entries are created by the
/// startup synchronizer, never through this handler.
pub struct OperationsHandler {
    db: Arc<Database>,
}

impl OperationsHandler {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl ResourceHandler for OperationsHandler {
    fn put(&self, _body: String, _user: AuthnUserInfo) -> Response {
        Response::method_not_allowed()
    }

    fn patch(&self, _id: String, _body: String, _user: AuthnUserInfo) -> Response {
        Response::method_not_allowed()
    }

    fn list(&self, query: Query, _user: AuthnUserInfo) -> Response {
        let feature_id = query.feature_id.clone();
        let result = self
            .db
            .with_transaction(|tx| tx.list_operations(feature_id.as_deref()));

        match result {
            Ok(ops) => Response::json(ops),
            Err(err) => {
                error!("List operations database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    fn get(&self, _id: String, _user: AuthnUserInfo) -> Response {
        Response::method_not_allowed()
    }

    fn delete(&self, _id: Option<String>, _body: Option<String>, _user: AuthnUserInfo) -> Response {
        Response::method_not_allowed()
    }
}
