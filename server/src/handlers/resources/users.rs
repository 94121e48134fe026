use std::sync::Arc;

use anyhow::Result;
use log::error;
use portal_misc::api::user::{PatchUserRequest, PutUserRequest, User, ADMIN_USER};
use portal_misc::api::{ListResponse, Query};
use portal_misc::{code, time};
use uuid::Uuid;

use crate::auth::AuthnUserInfo;
use crate::db::types::{PatchUserParams, Transaction, UserRecord};
use crate::db::Database;
use crate::expect_json;
use crate::policy::store::PolicyStore;
use crate::policy::sync;
use crate::response::{self, Response};

use super::ResourceHandler;

pub struct UsersHandler {
    db: Arc<Database>,
    store: Arc<PolicyStore>,
    salt_length: usize,
}

impl UsersHandler {
    pub fn new(db: Arc<Database>, store: Arc<PolicyStore>, salt_length: usize) -> Self {
        Self {
            db,
            store,
            salt_length,
        }
    }

    /// Role codes the subject actually inherits: assignments restricted to
    /// active roles, or nothing at all when the user itself is inactive.
    fn active_role_codes(tx: &dyn Transaction, user: &UserRecord) -> Result<Vec<String>> {
        if !user.is_active {
            return Ok(Vec::new());
        }
        let codes = tx
            .list_user_roles(&user.id)?
            .into_iter()
            .filter(|role| role.is_active)
            .map(|role| role.code)
            .collect();
        Ok(codes)
    }

    fn to_api_user(tx: &dyn Transaction, record: UserRecord) -> Result<User> {
        let roles = tx
            .list_user_roles(&record.id)?
            .into_iter()
            .map(|role| role.code)
            .collect();
        Ok(User {
            id: record.id,
            name: record.name,
            email: record.email,
            is_active: record.is_active,
            roles,
            create_time: record.create_time,
            update_time: record.update_time,
        })
    }

    fn sync_groupings(&self, subject: &str, roles: &[String]) -> Option<Response> {
        if let Err(e) = sync::sync_subject_roles(&self.store, subject, roles) {
            error!("Grouping sync for '{subject}' failed: {e:#}");
            return Some(Response::error(response::POLICY_ERROR));
        }
        None
    }
}

impl ResourceHandler for UsersHandler {
    /// Creates a user, or replaces an existing user's password and role set.
    /// Role replacement triggers grouping sync after the commit.
    fn put(&self, body: String, _user: AuthnUserInfo) -> Response {
        let req: PutUserRequest = expect_json!(body);
        if let Err(e) = req.validate() {
            return Response::bad_request(format!("{e:#}"));
        }

        let now = time::current_timestamp();
        let mut bad_request = None;
        let mut synced_roles: Vec<String> = Vec::new();
        let result: Result<()> = self.db.with_transaction(|tx| {
            let existing = tx.get_user_by_name(&req.name)?;

            let user_id = match existing {
                None => {
                    let password = match req.password {
                        Some(ref password) => password,
                        None => {
                            bad_request = Some("password is required for new user".to_string());
                            return Ok(());
                        }
                    };
                    if req.roles.is_empty() {
                        bad_request = Some("roles are required for new user".to_string());
                        return Ok(());
                    }

                    let salt = code::generate_salt(self.salt_length);
                    let record = UserRecord {
                        id: Uuid::new_v4().to_string(),
                        name: req.name.clone(),
                        email: req.email.clone(),
                        hash: code::sha256(format!("{password}{salt}")),
                        salt,
                        is_active: true,
                        create_time: now,
                        update_time: now,
                    };
                    tx.create_user(&record)?;
                    record.id
                }
                Some(record) => {
                    let secret = req.password.as_ref().map(|password| {
                        let salt = code::generate_salt(self.salt_length);
                        (code::sha256(format!("{password}{salt}")), salt)
                    });
                    tx.update_user(PatchUserParams {
                        id: record.id.clone(),
                        email: req.email.clone(),
                        secret,
                        is_active: None,
                        update_time: now,
                    })?;
                    record.id
                }
            };

            if !req.roles.is_empty() {
                tx.delete_user_roles(&user_id)?;
                for role_code in req.roles.iter() {
                    let role = match tx.get_role_by_code(role_code)? {
                        Some(role) => role,
                        None => {
                            bad_request = Some(format!("role '{role_code}' does not exist"));
                            anyhow::bail!("role not found");
                        }
                    };
                    tx.create_user_role(&user_id, &role.id)?;
                }
            }

            let record = match tx.get_user(&user_id)? {
                Some(record) => record,
                None => anyhow::bail!("user vanished inside transaction"),
            };
            synced_roles = Self::active_role_codes(tx, &record)?;
            Ok(())
        });

        if let Some(message) = bad_request {
            return Response::bad_request(message);
        }

        match result {
            Ok(()) => {
                if let Some(resp) = self.sync_groupings(&req.name, &synced_roles) {
                    return resp;
                }
                Response::ok()
            }
            Err(err) => {
                error!("Put user database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    fn patch(&self, id: String, body: String, _user: AuthnUserInfo) -> Response {
        let req: PatchUserRequest = expect_json!(body);
        if let Err(e) = req.validate() {
            return Response::bad_request(format!("{e:#}"));
        }

        let mut not_found = false;
        let mut protected = false;
        let mut bad_request = None;
        let mut subject = String::new();
        let mut synced_roles: Vec<String> = Vec::new();
        let result: Result<()> = self.db.with_transaction(|tx| {
            let record = match tx.get_user(&id)? {
                Some(record) => record,
                None => {
                    not_found = true;
                    return Ok(());
                }
            };
            if record.name == ADMIN_USER {
                protected = true;
                return Ok(());
            }
            subject = record.name.clone();

            let secret = req.password.as_ref().map(|password| {
                let salt = code::generate_salt(self.salt_length);
                (code::sha256(format!("{password}{salt}")), salt)
            });
            tx.update_user(PatchUserParams {
                id: id.clone(),
                email: req.email.clone(),
                secret,
                is_active: req.is_active,
                update_time: time::current_timestamp(),
            })?;

            if let Some(ref roles) = req.roles {
                tx.delete_user_roles(&id)?;
                for role_code in roles.iter() {
                    let role = match tx.get_role_by_code(role_code)? {
                        Some(role) => role,
                        None => {
                            bad_request = Some(format!("role '{role_code}' does not exist"));
                            anyhow::bail!("role not found");
                        }
                    };
                    tx.create_user_role(&id, &role.id)?;
                }
            }

            let record = match tx.get_user(&id)? {
                Some(record) => record,
                None => anyhow::bail!("user vanished inside transaction"),
            };
            synced_roles = Self::active_role_codes(tx, &record)?;
            Ok(())
        });

        if not_found {
            return Response::not_found("User not found");
        }
        if protected {
            return Response::unauthorized("Cannot modify admin user");
        }
        if let Some(message) = bad_request {
            return Response::bad_request(message);
        }

        match result {
            Ok(()) => {
                if let Some(resp) = self.sync_groupings(&subject, &synced_roles) {
                    return resp;
                }
                Response::ok()
            }
            Err(err) => {
                error!("Patch user database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    fn list(&self, query: Query, _user: AuthnUserInfo) -> Response {
        let result: Result<(Vec<User>, u64)> = self.db.with_transaction(|tx| {
            let total = tx.count_users(query.clone())?;
            let records = tx.list_users(query.clone())?;
            let mut users = Vec::with_capacity(records.len());
            for record in records {
                users.push(Self::to_api_user(tx, record)?);
            }
            Ok((users, total))
        });

        match result {
            Ok((items, total)) => Response::json(ListResponse {
                items,
                total,
                page: query.page,
                page_size: query.page_size,
            }),
            Err(err) => {
                error!("List users database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    fn get(&self, id: String, _user: AuthnUserInfo) -> Response {
        let result: Result<Option<User>> = self.db.with_transaction(|tx| {
            match tx.get_user(&id)? {
                Some(record) => Ok(Some(Self::to_api_user(tx, record)?)),
                None => Ok(None),
            }
        });

        match result {
            Ok(Some(user)) => Response::json(user),
            Ok(None) => Response::not_found("User not found"),
            Err(err) => {
                error!("Get user database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    /// Deletes the user row and its role assignments, then drops every
    /// grouping rule of the subject so no stale grants survive.
    fn delete(&self, id: Option<String>, _body: Option<String>, _user: AuthnUserInfo) -> Response {
        let id = match id {
            Some(id) => id,
            None => return Response::bad_request("User id is required"),
        };

        let mut not_found = false;
        let mut protected = false;
        let mut subject = String::new();
        let result: Result<()> = self.db.with_transaction(|tx| {
            let record = match tx.get_user(&id)? {
                Some(record) => record,
                None => {
                    not_found = true;
                    return Ok(());
                }
            };
            if record.name == ADMIN_USER {
                protected = true;
                return Ok(());
            }
            subject = record.name.clone();
            tx.delete_user_roles(&id)?;
            tx.delete_user(&id)?;
            Ok(())
        });

        if not_found {
            return Response::not_found("User not found");
        }
        if protected {
            return Response::unauthorized("Cannot delete admin user");
        }

        match result {
            Ok(()) => {
                self.store.delete_all_groupings_for_subject(&subject);
                if let Err(e) = self.store.persist() {
                    error!("Persist after user deletion failed: {e:#}");
                    return Response::error(response::POLICY_ERROR);
                }
                Response::ok()
            }
            Err(err) => {
                error!("Delete user database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use portal_misc::api::role::Role;

    use super::*;

    fn test_handler() -> (Arc<Database>, Arc<PolicyStore>, UsersHandler) {
        let db = Arc::new(Database::new_test());
        let store = Arc::new(PolicyStore::new(db.clone()));
        store.load().unwrap();
        let handler = UsersHandler::new(db.clone(), store.clone(), 24);

        db.with_transaction(|tx| {
            for (id, name, code) in [
                ("role-qa", "QA engineers", "QA"),
                ("role-dev", "Developers", "DEV"),
            ] {
                tx.create_role(&Role {
                    id: id.to_string(),
                    name: name.to_string(),
                    code: code.to_string(),
                    is_active: true,
                    create_time: 1,
                    update_time: 1,
                })?;
            }
            Ok(())
        })
        .unwrap();

        (db, store, handler)
    }

    fn test_admin() -> AuthnUserInfo {
        AuthnUserInfo::new("admin".to_string(), vec!["ADMIN".to_string()])
    }

    fn put_user(handler: &UsersHandler, name: &str, roles: &[&str]) -> Response {
        let body = serde_json::to_string(&PutUserRequest {
            name: name.to_string(),
            email: None,
            password: Some("secret123".to_string()),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        })
        .unwrap();
        handler.put(body, test_admin())
    }

    #[test]
    fn test_put_user_syncs_groupings() {
        let (db, store, handler) = test_handler();

        let resp = put_user(&handler, "user123", &["QA"]);
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(store.subject_roles("user123").contains("QA"));

        let record = db
            .with_transaction(|tx| tx.get_user_by_name("user123"))
            .unwrap()
            .unwrap();
        assert_eq!(record.hash, code::sha256(format!("secret123{}", record.salt)));

        // Role replace drops the old grouping atomically.
        let resp = put_user(&handler, "user123", &["DEV"]);
        assert_eq!(resp.status(), StatusCode::OK);
        let roles = store.subject_roles("user123");
        assert!(roles.contains("DEV"));
        assert!(!roles.contains("QA"));
    }

    #[test]
    fn test_put_user_unknown_role() {
        let (db, _store, handler) = test_handler();

        let resp = put_user(&handler, "user123", &["NOPE"]);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        // Rolled back: no user row was left behind.
        let record = db
            .with_transaction(|tx| tx.get_user_by_name("user123"))
            .unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn test_deactivate_user_drops_groupings() {
        let (db, store, handler) = test_handler();

        put_user(&handler, "user123", &["QA"]);
        let record = db
            .with_transaction(|tx| tx.get_user_by_name("user123"))
            .unwrap()
            .unwrap();

        let body = serde_json::to_string(&PatchUserRequest {
            is_active: Some(false),
            ..Default::default()
        })
        .unwrap();
        let resp = handler.patch(record.id.clone(), body, test_admin());
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(store.subject_roles("user123").is_empty());

        let body = serde_json::to_string(&PatchUserRequest {
            is_active: Some(true),
            ..Default::default()
        })
        .unwrap();
        handler.patch(record.id, body, test_admin());
        assert!(store.subject_roles("user123").contains("QA"));
    }

    #[test]
    fn test_delete_user() {
        let (db, store, handler) = test_handler();

        put_user(&handler, "user123", &["QA"]);
        let record = db
            .with_transaction(|tx| tx.get_user_by_name("user123"))
            .unwrap()
            .unwrap();

        let resp = handler.delete(Some(record.id), None, test_admin());
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(store.subject_roles("user123").is_empty());
    }
}
