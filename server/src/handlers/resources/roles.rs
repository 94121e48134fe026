use std::sync::Arc;

use anyhow::Result;
use log::{error, warn};
use portal_misc::api::role::{PatchRoleRequest, PutRoleRequest, Role, ADMIN_ROLE_CODE};
use portal_misc::api::{ListResponse, Query};
use portal_misc::time;
use uuid::Uuid;

use crate::auth::AuthnUserInfo;
use crate::db::types::PatchRoleParams;
use crate::db::Database;
use crate::expect_json;
use crate::policy::store::PolicyStore;
use crate::policy::{sync, PolicyError, PolicyRule, StaleSide};
use crate::response::{self, Response};

use super::ResourceHandler;

pub struct RolesHandler {
    db: Arc<Database>,
    store: Arc<PolicyStore>,
}

impl RolesHandler {
    pub fn new(db: Arc<Database>, store: Arc<PolicyStore>) -> Self {
        Self { db, store }
    }
}

impl ResourceHandler for RolesHandler {
    fn put(&self, body: String, _user: AuthnUserInfo) -> Response {
        let req: PutRoleRequest = expect_json!(body);
        if let Err(e) = req.validate() {
            return Response::bad_request(format!("{e:#}"));
        }

        let now = time::current_timestamp();
        let role = Role {
            id: Uuid::new_v4().to_string(),
            name: req.name,
            code: req.code,
            is_active: req.is_active.unwrap_or(true),
            create_time: now,
            update_time: now,
        };

        let mut conflict = None;
        let result: Result<()> = self.db.with_transaction(|tx| {
            if tx.has_role_name(&role.name)? {
                conflict = Some("Role name already exists");
                return Ok(());
            }
            if tx.get_role_by_code(&role.code)?.is_some() {
                conflict = Some("Role code already exists");
                return Ok(());
            }
            tx.create_role(&role)?;
            Ok(())
        });

        if let Some(message) = conflict {
            return Response::conflict(message);
        }

        match result {
            Ok(()) => Response::json(role),
            Err(err) => {
                error!("Put role database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    fn patch(&self, id: String, body: String, _user: AuthnUserInfo) -> Response {
        let req: PatchRoleRequest = expect_json!(body);
        if let Err(e) = req.validate() {
            return Response::bad_request(format!("{e:#}"));
        }

        let mut not_found = false;
        let mut conflict = false;
        let mut admin_deactivate = false;
        let mut active_changed = false;
        let result: Result<Option<Role>> = self.db.with_transaction(|tx| {
            let role = match tx.get_role(&id)? {
                Some(role) => role,
                None => {
                    not_found = true;
                    return Ok(None);
                }
            };

            // The administrator role is a protected singleton; rejecting the
            // deactivation before any mutation keeps storage untouched.
            if role.code == ADMIN_ROLE_CODE && req.is_active == Some(false) {
                admin_deactivate = true;
                return Ok(None);
            }

            if let Some(ref name) = req.name {
                if name != &role.name && tx.has_role_name(name)? {
                    conflict = true;
                    return Ok(None);
                }
            }

            active_changed = req
                .is_active
                .map(|active| active != role.is_active)
                .unwrap_or(false);

            tx.update_role(PatchRoleParams {
                id: id.clone(),
                name: req.name.clone(),
                is_active: req.is_active,
                update_time: time::current_timestamp(),
            })?;
            tx.get_role(&id)
        });

        if not_found {
            return Response::not_found("Role not found");
        }
        if admin_deactivate {
            return Response::bad_request("Cannot deactivate the administrator role");
        }
        if conflict {
            return Response::conflict("Role name already exists");
        }

        match result {
            Ok(Some(role)) => {
                // Grouping rules derive from active roles only, so an
                // activation flip must be projected into the store.
                if active_changed {
                    if let Err(e) = sync::rebuild_policies(&self.db, &self.store) {
                        error!("Rebuilding policies after role activation change failed: {e:#}");
                        return Response::error(response::POLICY_ERROR);
                    }
                }
                Response::json(role)
            }
            Ok(None) => Response::not_found("Role not found"),
            Err(err) => {
                error!("Patch role database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    fn list(&self, query: Query, _user: AuthnUserInfo) -> Response {
        let result: Result<(Vec<Role>, u64)> = self.db.with_transaction(|tx| {
            let total = tx.count_roles(query.clone())?;
            let items = tx.list_roles(query.clone())?;
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
                error!("List roles database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    fn get(&self, id: String, _user: AuthnUserInfo) -> Response {
        match self.db.with_transaction(|tx| tx.get_role(&id)) {
            Ok(Some(role)) => Response::json(role),
            Ok(None) => Response::not_found("Role not found"),
            Err(err) => {
                error!("Get role database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    fn delete(&self, id: Option<String>, _body: Option<String>, _user: AuthnUserInfo) -> Response {
        let id = match id {
            Some(id) => id,
            None => return Response::bad_request("Role id is required"),
        };

        let mut not_found = false;
        let mut admin_delete = false;
        let mut in_use = false;
        let mut revoked: Vec<PolicyRule> = Vec::new();
        let result: Result<()> = self.db.with_transaction(|tx| {
            let role = match tx.get_role(&id)? {
                Some(role) => role,
                None => {
                    not_found = true;
                    return Ok(());
                }
            };
            if role.code == ADMIN_ROLE_CODE {
                admin_delete = true;
                return Ok(());
            }
            if tx.is_role_in_use(&id)? {
                in_use = true;
                return Ok(());
            }

            // Cascade the role's permission rows; their mirrored rules are
            // revoked from the store after this transaction commits.
            for perm in tx.list_permissions(Some(&role.code))? {
                revoked.push(PolicyRule::new(
                    perm.role_code,
                    perm.feature_code,
                    perm.operation,
                ));
            }
            tx.delete_role_permissions(&id)?;
            tx.delete_role(&id)?;
            Ok(())
        });

        if not_found {
            return Response::not_found("Role not found");
        }
        if admin_delete {
            return Response::bad_request("Cannot delete the administrator role");
        }
        if in_use {
            return Response::bad_request("Role is assigned to users, cannot be deleted");
        }

        match result {
            Ok(()) => {
                if !revoked.is_empty() {
                    if let Err(e) = self.store.revoke(&revoked) {
                        for rule in &revoked {
                            error!(
                                "{}",
                                PolicyError::Inconsistency {
                                    rule: rule.clone(),
                                    side: StaleSide::PolicyStore,
                                }
                            );
                        }
                        warn!("Role deletion committed but policy revoke failed: {e:#}");
                        return Response::error(response::POLICY_ERROR);
                    }
                }
                Response::ok()
            }
            Err(err) => {
                error!("Delete role database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;

    use super::*;

    fn test_handler() -> (Arc<Database>, Arc<PolicyStore>, RolesHandler) {
        let db = Arc::new(Database::new_test());
        let store = Arc::new(PolicyStore::new(db.clone()));
        store.load().unwrap();
        let handler = RolesHandler::new(db.clone(), store.clone());
        (db, store, handler)
    }

    fn test_user() -> AuthnUserInfo {
        AuthnUserInfo::new("admin".to_string(), vec![ADMIN_ROLE_CODE.to_string()])
    }

    fn put_role(handler: &RolesHandler, name: &str, code: &str) -> Response {
        let body = serde_json::to_string(&PutRoleRequest {
            name: name.to_string(),
            code: code.to_string(),
            is_active: None,
        })
        .unwrap();
        handler.put(body, test_user())
    }

    #[test]
    fn test_put_role_conflicts() {
        let (_db, _store, handler) = test_handler();

        assert_eq!(put_role(&handler, "QA engineers", "QA").status(), StatusCode::OK);
        assert_eq!(
            put_role(&handler, "QA engineers", "QA2").status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            put_role(&handler, "Other name", "QA").status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_admin_role_protected() {
        let (db, _store, handler) = test_handler();

        put_role(&handler, "Administrators", ADMIN_ROLE_CODE);
        let admin = db
            .with_transaction(|tx| tx.get_role_by_code(ADMIN_ROLE_CODE))
            .unwrap()
            .unwrap();

        // Deleting the ADMIN role is rejected and storage is untouched.
        let resp = handler.delete(Some(admin.id.clone()), None, test_user());
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let still = db.with_transaction(|tx| tx.get_role(&admin.id)).unwrap();
        assert!(still.is_some());

        // Deactivating it is rejected as well.
        let body = serde_json::to_string(&PatchRoleRequest {
            name: None,
            is_active: Some(false),
        })
        .unwrap();
        let resp = handler.patch(admin.id.clone(), body, test_user());
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let still = db
            .with_transaction(|tx| tx.get_role(&admin.id))
            .unwrap()
            .unwrap();
        assert!(still.is_active);
    }

    #[test]
    fn test_delete_role_in_use() {
        let (db, _store, handler) = test_handler();

        put_role(&handler, "QA engineers", "QA");
        let role = db
            .with_transaction(|tx| tx.get_role_by_code("QA"))
            .unwrap()
            .unwrap();

        db.with_transaction(|tx| {
            tx.create_user(&crate::db::types::UserRecord {
                id: "user-1".to_string(),
                name: "user123".to_string(),
                email: None,
                hash: "hash".to_string(),
                salt: "salt".to_string(),
                is_active: true,
                create_time: 1,
                update_time: 1,
            })?;
            tx.create_user_role("user-1", &role.id)
        })
        .unwrap();

        let resp = handler.delete(Some(role.id.clone()), None, test_user());
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_delete_role_revokes_rules() {
        let (db, store, handler) = test_handler();

        put_role(&handler, "QA engineers", "QA");
        let role = db
            .with_transaction(|tx| tx.get_role_by_code("QA"))
            .unwrap()
            .unwrap();

        db.with_transaction(|tx| {
            tx.create_permission(&portal_misc::api::permission::Permission {
                id: "perm-1".to_string(),
                role_id: role.id.clone(),
                role_code: "QA".to_string(),
                feature_id: "feature-1".to_string(),
                feature_code: "PROJECT".to_string(),
                operation: "list_projects".to_string(),
                create_time: 1,
                update_time: 1,
            })
        })
        .unwrap();
        store
            .grant(vec![PolicyRule::new("QA", "PROJECT", "list_projects")])
            .unwrap();

        let resp = handler.delete(Some(role.id.clone()), None, test_user());
        assert_eq!(resp.status(), StatusCode::OK);

        assert!(!store.has_permission_rule(&PolicyRule::new("QA", "PROJECT", "list_projects")));
        let perms = db.with_transaction(|tx| tx.list_permissions(None)).unwrap();
        assert!(perms.is_empty());
    }
}
