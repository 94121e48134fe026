use std::sync::Arc;

use anyhow::Result;
use log::error;
use portal_misc::api::session::Session;
use portal_misc::api::{ListResponse, Query};

use crate::auth::AuthnUserInfo;
use crate::db::Database;
use crate::response::{self, Response};

use super::ResourceHandler;

/// Operator view over login sessions. Sessions are created by the login
/// handler; here they can only be inspected and force-deleted.
pub struct SessionsHandler {
    db: Arc<Database>,
}

impl SessionsHandler {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl ResourceHandler for SessionsHandler {
    fn put(&self, _body: String, _user: AuthnUserInfo) -> Response {
        Response::method_not_allowed()
    }

    fn patch(&self, _id: String, _body: String, _user: AuthnUserInfo) -> Response {
        Response::method_not_allowed()
    }

    fn list(&self, query: Query, _user: AuthnUserInfo) -> Response {
        let result: Result<(Vec<Session>, u64)> = self.db.with_transaction(|tx| {
            let total = tx.count_sessions(query.clone())?;
            let items = tx.list_sessions(query.clone())?;
            Ok((items, total))
        });

        match result {
            Ok((items, total)) => Response::json(ListResponse {
                items,
                total,
                page: query.page,
                page_size: query.page_size,
            }),
            Err(err) => {
                error!("List sessions database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    fn get(&self, id: String, _user: AuthnUserInfo) -> Response {
        match self.db.with_transaction(|tx| tx.get_session(&id)) {
            Ok(Some(session)) => Response::json(session),
            Ok(None) => Response::not_found("Session not found"),
            Err(err) => {
                error!("Get session database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    fn delete(&self, id: Option<String>, _body: Option<String>, _user: AuthnUserInfo) -> Response {
        let id = match id {
            Some(id) => id,
            None => return Response::bad_request("Session id is required"),
        };

        let mut not_found = false;
        let result: Result<()> = self.db.with_transaction(|tx| {
            if tx.get_session(&id)?.is_none() {
                not_found = true;
                return Ok(());
            }
            tx.delete_session(&id)
        });

        if not_found {
            return Response::not_found("Session not found");
        }

        match result {
            Ok(()) => Response::ok(),
            Err(err) => {
                error!("Delete session database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }
}
