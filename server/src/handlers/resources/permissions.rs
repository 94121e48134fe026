use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use log::error;
use portal_misc::api::permission::{
    DeletePermissionsRequest, FeaturePermissions, OperationGrant, PatchPermissionRequest,
    Permission, PutPermissionRequest,
};
use portal_misc::api::{ListResponse, Query};
use portal_misc::time;
use uuid::Uuid;

use crate::auth::AuthnUserInfo;
use crate::db::types::PatchPermissionParams;
use crate::db::Database;
use crate::expect_json;
use crate::policy::store::PolicyStore;
use crate::policy::{PolicyError, PolicyRule, StaleSide};
use crate::response::{self, Response};

use super::ResourceHandler;

pub struct PermissionsHandler {
    db: Arc<Database>,
    store: Arc<PolicyStore>,
}

impl PermissionsHandler {
    pub fn new(db: Arc<Database>, store: Arc<PolicyStore>) -> Self {
        Self { db, store }
    }

    fn report_stale_rules(rules: &[PolicyRule]) {
        for rule in rules {
            error!(
                "{}",
                PolicyError::Inconsistency {
                    rule: rule.clone(),
                    side: StaleSide::PolicyStore,
                }
            );
        }
    }
}

impl ResourceHandler for PermissionsHandler {
    /// Bulk grant. The referenced role and every referenced operation must
    /// exist; the relational rows are written first and the mirrored policy
    /// rules are granted right after the commit. A failure between the two
    /// leaves a detectable inconsistency which is logged per rule and
    /// resolved by a full resync.
    fn put(&self, body: String, _user: AuthnUserInfo) -> Response {
        let req: PutPermissionRequest = expect_json!(body);
        if let Err(e) = req.validate() {
            return Response::bad_request(format!("{e:#}"));
        }

        let now = time::current_timestamp();
        let mut not_found = None;
        let mut created: Vec<Permission> = Vec::new();
        let result: Result<()> = self.db.with_transaction(|tx| {
            let role = match tx.get_role(&req.role_id)? {
                Some(role) => role,
                None => {
                    not_found = Some("Role not found");
                    return Ok(());
                }
            };

            for grant in req.grants.iter() {
                let op = match tx.find_operation(&grant.feature_id, &grant.operation)? {
                    Some(op) => op,
                    None => {
                        not_found = Some("Feature operation not found");
                        return Ok(());
                    }
                };

                // The tuple is the rule identity; granting it twice must
                // not create a second row.
                if tx.has_permission_tuple(&role.code, &op.feature_code, &op.operation)? {
                    continue;
                }

                let perm = Permission {
                    id: Uuid::new_v4().to_string(),
                    role_id: role.id.clone(),
                    role_code: role.code.clone(),
                    feature_id: op.feature_id,
                    feature_code: op.feature_code,
                    operation: op.operation,
                    create_time: now,
                    update_time: now,
                };
                tx.create_permission(&perm)?;
                created.push(perm);
            }
            Ok(())
        });

        if let Some(message) = not_found {
            return Response::not_found(message);
        }
        if let Err(err) = result {
            error!("Put permission database error: {err:#}");
            return Response::error(response::DATABASE_ERROR);
        }

        let rules: Vec<PolicyRule> = created
            .iter()
            .map(|p| PolicyRule::new(&p.role_code, &p.feature_code, &p.operation))
            .collect();
        if !rules.is_empty() {
            if let Err(e) = self.store.grant(rules.clone()) {
                Self::report_stale_rules(&rules);
                error!("Permission rows committed but policy grant failed: {e:#}");
                return Response::error(response::POLICY_ERROR);
            }
        }

        Response::json(created)
    }

    /// Updates one grant. The old tuple is removed from the store before the
    /// new one is added, so a rename can never leave an orphaned rule.
    fn patch(&self, id: String, body: String, _user: AuthnUserInfo) -> Response {
        let req: PatchPermissionRequest = expect_json!(body);
        if let Err(e) = req.validate() {
            return Response::bad_request(format!("{e:#}"));
        }

        let mut not_found = None;
        let mut conflict = false;
        let mut old_rule = None;
        let result: Result<Option<Permission>> = self.db.with_transaction(|tx| {
            let perm = match tx.get_permission(&id)? {
                Some(perm) => perm,
                None => {
                    not_found = Some("Permission not found");
                    return Ok(None);
                }
            };
            old_rule = Some(PolicyRule::new(
                &perm.role_code,
                &perm.feature_code,
                &perm.operation,
            ));

            let (role_id, role_code) = match req.role_id {
                Some(ref role_id) => match tx.get_role(role_id)? {
                    Some(role) => (role.id, role.code),
                    None => {
                        not_found = Some("Role not found");
                        return Ok(None);
                    }
                },
                None => (perm.role_id.clone(), perm.role_code.clone()),
            };

            let (feature_id, feature_code, operation) =
                if req.feature_id.is_some() || req.operation.is_some() {
                    let feature_id = req.feature_id.clone().unwrap_or(perm.feature_id.clone());
                    let operation = req.operation.clone().unwrap_or(perm.operation.clone());
                    match tx.find_operation(&feature_id, &operation)? {
                        Some(op) => (op.feature_id, op.feature_code, op.operation),
                        None => {
                            not_found = Some("Feature operation not found");
                            return Ok(None);
                        }
                    }
                } else {
                    (
                        perm.feature_id.clone(),
                        perm.feature_code.clone(),
                        perm.operation.clone(),
                    )
                };

            let tuple_changed = role_code != perm.role_code
                || feature_code != perm.feature_code
                || operation != perm.operation;
            if tuple_changed && tx.has_permission_tuple(&role_code, &feature_code, &operation)? {
                conflict = true;
                return Ok(None);
            }

            tx.update_permission(PatchPermissionParams {
                id: id.clone(),
                role_id,
                role_code,
                feature_id,
                feature_code,
                operation,
                update_time: time::current_timestamp(),
            })?;
            tx.get_permission(&id)
        });

        if let Some(message) = not_found {
            return Response::not_found(message);
        }
        if conflict {
            return Response::conflict("Permission already exists for this tuple");
        }

        match result {
            Ok(Some(perm)) => {
                let old = old_rule.unwrap_or_else(|| {
                    PolicyRule::new(&perm.role_code, &perm.feature_code, &perm.operation)
                });
                let new = PolicyRule::new(&perm.role_code, &perm.feature_code, &perm.operation);
                if let Err(e) = self.store.replace_rule(&old, new.clone()) {
                    Self::report_stale_rules(&[new]);
                    error!("Permission update committed but policy swap failed: {e:#}");
                    return Response::error(response::POLICY_ERROR);
                }
                Response::json(perm)
            }
            Ok(None) => Response::not_found("Permission not found"),
            Err(err) => {
                error!("Patch permission database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    /// Permissions dashboard listing: every registry operation grouped by
    /// feature, annotated with whether the queried role owns a grant on it.
    /// Groups owned by the role sort first; pagination applies to groups.
    fn list(&self, query: Query, _user: AuthnUserInfo) -> Response {
        let role_code = query.role_code.clone();
        let result: Result<(Vec<_>, Vec<_>)> = self.db.with_transaction(|tx| {
            let ops = tx.list_operations(None)?;
            let perms = match role_code {
                Some(ref code) => tx.list_permissions(Some(code))?,
                None => Vec::new(),
            };
            Ok((ops, perms))
        });

        let (ops, perms) = match result {
            Ok(data) => data,
            Err(err) => {
                error!("List permissions database error: {err:#}");
                return Response::error(response::DATABASE_ERROR);
            }
        };

        let mut grouped: HashMap<String, Vec<OperationGrant>> = HashMap::new();
        for op in ops {
            let owned = perms
                .iter()
                .find(|p| p.feature_code == op.feature_code && p.operation == op.operation);
            grouped
                .entry(op.feature_code.clone())
                .or_default()
                .push(OperationGrant {
                    id: op.id,
                    feature_id: op.feature_id,
                    feature_code: op.feature_code,
                    operation: op.operation,
                    permission_id: owned.map(|p| p.id.clone()).unwrap_or_default(),
                    own: owned.is_some(),
                    create_time: op.create_time,
                    update_time: op.update_time,
                });
        }

        let mut items: Vec<FeaturePermissions> = grouped
            .into_iter()
            .map(|(feature_code, permissions)| FeaturePermissions {
                own: permissions.iter().any(|p| p.own),
                feature_code,
                permissions,
            })
            .collect();
        items.sort_by(|a, b| b.own.cmp(&a.own).then(a.feature_code.cmp(&b.feature_code)));

        let total = items.len() as u64;
        let start = (query.offset() as usize).min(items.len());
        let end = (start + query.page_size as usize).min(items.len());
        let items = items[start..end].to_vec();

        Response::json(ListResponse {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    fn get(&self, id: String, _user: AuthnUserInfo) -> Response {
        match self.db.with_transaction(|tx| tx.get_permission(&id)) {
            Ok(Some(perm)) => Response::json(perm),
            Ok(None) => Response::not_found("Permission not found"),
            Err(err) => {
                error!("Get permission database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    /// Deletes grants by path id or by a bulk ids payload. The relational
    /// rows go first; the mirrored rules are revoked after the commit.
    fn delete(&self, id: Option<String>, body: Option<String>, _user: AuthnUserInfo) -> Response {
        let ids = match (id, body) {
            (Some(id), _) => vec![id],
            (None, Some(body)) => {
                let req: DeletePermissionsRequest = expect_json!(body);
                req.ids
            }
            (None, None) => return Response::bad_request("Permission ids are required"),
        };
        if ids.is_empty() {
            return Response::bad_request("Permission ids are required");
        }

        let mut revoked: Vec<PolicyRule> = Vec::new();
        let result: Result<()> = self.db.with_transaction(|tx| {
            for id in ids.iter() {
                if let Some(perm) = tx.get_permission(id)? {
                    revoked.push(PolicyRule::new(
                        &perm.role_code,
                        &perm.feature_code,
                        &perm.operation,
                    ));
                    tx.delete_permission(id)?;
                }
            }
            Ok(())
        });

        if let Err(err) = result {
            error!("Delete permission database error: {err:#}");
            return Response::error(response::DATABASE_ERROR);
        }
        if revoked.is_empty() {
            return Response::not_found("Permission not found");
        }

        if let Err(e) = self.store.revoke(&revoked) {
            Self::report_stale_rules(&revoked);
            error!("Permission rows deleted but policy revoke failed: {e:#}");
            return Response::error(response::POLICY_ERROR);
        }

        Response::ok()
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use portal_misc::api::feature::{Feature, FeatureOperation};
    use portal_misc::api::permission::PermissionGrant;
    use portal_misc::api::role::Role;

    use crate::policy::enforcer::Enforcer;

    use super::*;

    struct TestEnv {
        db: Arc<Database>,
        store: Arc<PolicyStore>,
        enforcer: Enforcer,
        handler: PermissionsHandler,
    }

    fn test_env() -> TestEnv {
        let db = Arc::new(Database::new_test());
        let store = Arc::new(PolicyStore::new(db.clone()));
        store.load().unwrap();
        let enforcer = Enforcer::new(store.clone());
        let handler = PermissionsHandler::new(db.clone(), store.clone());

        db.with_transaction(|tx| {
            tx.create_feature(&Feature {
                id: "feature-project".to_string(),
                code: "PROJECT".to_string(),
                name: "Project management".to_string(),
                create_time: 1,
                update_time: 1,
            })?;
            tx.create_role(&Role {
                id: "role-qa".to_string(),
                name: "QA engineers".to_string(),
                code: "QA".to_string(),
                is_active: true,
                create_time: 1,
                update_time: 1,
            })?;
            for operation in ["list_projects", "view_projects"] {
                tx.upsert_operation(&FeatureOperation {
                    id: Uuid::new_v4().to_string(),
                    feature_id: "feature-project".to_string(),
                    feature_code: "PROJECT".to_string(),
                    operation: operation.to_string(),
                    create_time: 1,
                    update_time: 1,
                })?;
            }
            Ok(())
        })
        .unwrap();

        TestEnv {
            db,
            store,
            enforcer,
            handler,
        }
    }

    fn test_user() -> AuthnUserInfo {
        AuthnUserInfo::new("admin".to_string(), vec!["ADMIN".to_string()])
    }

    fn grant(handler: &PermissionsHandler, role_id: &str, operation: &str) -> Response {
        let body = serde_json::to_string(&PutPermissionRequest {
            role_id: role_id.to_string(),
            grants: vec![PermissionGrant {
                feature_id: "feature-project".to_string(),
                operation: operation.to_string(),
            }],
        })
        .unwrap();
        handler.put(body, test_user())
    }

    #[test]
    fn test_put_permission_mirrors_rule() {
        let env = test_env();

        let resp = grant(&env.handler, "role-qa", "list_projects");
        assert_eq!(resp.status(), StatusCode::OK);

        // The rule is mirrored into the store...
        assert!(env
            .store
            .has_permission_rule(&PolicyRule::new("QA", "PROJECT", "list_projects")));

        // ...and the grant takes effect once the subject is grouped.
        assert!(!env
            .enforcer
            .allowed("user123", "PROJECT", "list_projects")
            .unwrap());
        crate::policy::sync::sync_subject_roles(&env.store, "user123", &["QA".to_string()])
            .unwrap();
        assert!(env
            .enforcer
            .allowed("user123", "PROJECT", "list_projects")
            .unwrap());

        // Granting the same tuple again is a no-op, not a second row.
        let resp = grant(&env.handler, "role-qa", "list_projects");
        assert_eq!(resp.status(), StatusCode::OK);
        let perms = env
            .db
            .with_transaction(|tx| tx.list_permissions(Some("QA")))
            .unwrap();
        assert_eq!(perms.len(), 1);
    }

    #[test]
    fn test_put_permission_unknown_references() {
        let env = test_env();

        let resp = grant(&env.handler, "no-such-role", "list_projects");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = grant(&env.handler, "role-qa", "no_such_operation");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        // Aborted before any mutation.
        let perms = env.db.with_transaction(|tx| tx.list_permissions(None)).unwrap();
        assert!(perms.is_empty());
    }

    #[test]
    fn test_patch_permission_swaps_rule() {
        let env = test_env();

        grant(&env.handler, "role-qa", "list_projects");
        crate::policy::sync::sync_subject_roles(&env.store, "user123", &["QA".to_string()])
            .unwrap();
        let perm = env
            .db
            .with_transaction(|tx| tx.list_permissions(Some("QA")))
            .unwrap()
            .remove(0);

        let body = serde_json::to_string(&PatchPermissionRequest {
            role_id: None,
            feature_id: None,
            operation: Some("view_projects".to_string()),
        })
        .unwrap();
        let resp = env.handler.patch(perm.id.clone(), body, test_user());
        assert_eq!(resp.status(), StatusCode::OK);

        // Exactly one of the two operations is allowed, never both.
        assert!(!env
            .enforcer
            .allowed("user123", "PROJECT", "list_projects")
            .unwrap());
        assert!(env
            .enforcer
            .allowed("user123", "PROJECT", "view_projects")
            .unwrap());

        assert!(!env
            .store
            .has_permission_rule(&PolicyRule::new("QA", "PROJECT", "list_projects")));
        assert!(env
            .store
            .has_permission_rule(&PolicyRule::new("QA", "PROJECT", "view_projects")));
    }

    #[test]
    fn test_delete_permission_revokes_rule() {
        let env = test_env();

        grant(&env.handler, "role-qa", "list_projects");
        let perm = env
            .db
            .with_transaction(|tx| tx.list_permissions(Some("QA")))
            .unwrap()
            .remove(0);

        let body = serde_json::to_string(&DeletePermissionsRequest {
            ids: vec![perm.id.clone()],
        })
        .unwrap();
        let resp = env.handler.delete(None, Some(body), test_user());
        assert_eq!(resp.status(), StatusCode::OK);

        assert!(!env
            .store
            .has_permission_rule(&PolicyRule::new("QA", "PROJECT", "list_projects")));

        // Deleting a missing permission is a not found, not a crash.
        let resp = env.handler.delete(Some(perm.id), None, test_user());
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_list_permissions_grouped() {
        let env = test_env();
        grant(&env.handler, "role-qa", "list_projects");

        let query = Query {
            role_code: Some("QA".to_string()),
            ..Default::default()
        };
        let resp = env.handler.list(query, test_user());
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
