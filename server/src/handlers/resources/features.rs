use std::sync::Arc;

use anyhow::Result;
use log::{error, info};
use portal_misc::api::feature::{Feature, PatchFeatureRequest, PutFeatureRequest};
use portal_misc::api::{ListResponse, Query};
use portal_misc::time;
use uuid::Uuid;

use crate::auth::AuthnUserInfo;
use crate::db::types::PatchFeatureParams;
use crate::db::Database;
use crate::expect_json;
use crate::response::{self, Response};

use super::ResourceHandler;

pub struct FeaturesHandler {
    db: Arc<Database>,
}

impl FeaturesHandler {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl ResourceHandler for FeaturesHandler {
    fn put(&self, body: String, _user: AuthnUserInfo) -> Response {
        let req: PutFeatureRequest = expect_json!(body);
        if let Err(e) = req.validate() {
            return Response::bad_request(format!("{e:#}"));
        }

        let now = time::current_timestamp();
        let feature = Feature {
            id: Uuid::new_v4().to_string(),
            code: req.code,
            name: req.name,
            create_time: now,
            update_time: now,
        };

        let mut conflict = false;
        let mut adopted = 0;
        let result: Result<()> = self.db.with_transaction(|tx| {
            if tx.get_feature_by_code(&feature.code)?.is_some() {
                conflict = true;
                return Ok(());
            }
            tx.create_feature(&feature)?;
            adopted = tx.adopt_feature_operations(&feature.id, &feature.code, now)?;
            Ok(())
        });

        if conflict {
            return Response::conflict("Feature code already exists");
        }

        match result {
            Ok(()) => {
                if adopted > 0 {
                    info!(
                        "Feature {} adopted {adopted} previously orphaned operations",
                        feature.code
                    );
                }
                Response::json(feature)
            }
            Err(err) => {
                error!("Put feature database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    fn patch(&self, id: String, body: String, _user: AuthnUserInfo) -> Response {
        let req: PatchFeatureRequest = expect_json!(body);
        if let Err(e) = req.validate() {
            return Response::bad_request(format!("{e:#}"));
        }

        let result: Result<Option<Feature>> = self.db.with_transaction(|tx| {
            if tx.get_feature(&id)?.is_none() {
                return Ok(None);
            }
            tx.update_feature(PatchFeatureParams {
                id: id.clone(),
                name: req.name.clone(),
                update_time: time::current_timestamp(),
            })?;
            tx.get_feature(&id)
        });

        match result {
            Ok(Some(feature)) => Response::json(feature),
            Ok(None) => Response::not_found("Feature not found"),
            Err(err) => {
                error!("Patch feature database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    fn list(&self, query: Query, _user: AuthnUserInfo) -> Response {
        let result: Result<(Vec<Feature>, u64)> = self.db.with_transaction(|tx| {
            let total = tx.count_features(query.clone())?;
            let items = tx.list_features(query.clone())?;
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
                error!("List features database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    fn get(&self, id: String, _user: AuthnUserInfo) -> Response {
        match self.db.with_transaction(|tx| tx.get_feature(&id)) {
            Ok(Some(feature)) => Response::json(feature),
            Ok(None) => Response::not_found("Feature not found"),
            Err(err) => {
                error!("Get feature database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }

    fn delete(&self, id: Option<String>, _body: Option<String>, _user: AuthnUserInfo) -> Response {
        let id = match id {
            Some(id) => id,
            None => return Response::bad_request("Feature id is required"),
        };

        let mut not_found = false;
        let mut in_use = false;
        let mut orphaned = 0;
        let mut code = String::new();
        let result: Result<()> = self.db.with_transaction(|tx| {
            let feature = match tx.get_feature(&id)? {
                Some(feature) => feature,
                None => {
                    not_found = true;
                    return Ok(());
                }
            };
            if tx.has_feature_permissions(&feature.code)? {
                in_use = true;
                return Ok(());
            }
            tx.delete_feature(&id)?;
            orphaned = tx.detach_feature_operations(&id, time::current_timestamp())?;
            code = feature.code;
            Ok(())
        });

        if not_found {
            return Response::not_found("Feature not found");
        }
        if in_use {
            return Response::bad_request("Feature has permissions, cannot be deleted");
        }

        match result {
            Ok(()) => {
                if orphaned > 0 {
                    info!("Deleting feature {code} orphaned {orphaned} registry operations");
                }
                Response::ok()
            }
            Err(err) => {
                error!("Delete feature database error: {err:#}");
                Response::error(response::DATABASE_ERROR)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;

    use super::*;

    fn put_feature(handler: &FeaturesHandler, code: &str, name: &str) -> Response {
        let body = serde_json::to_string(&PutFeatureRequest {
            code: code.to_string(),
            name: name.to_string(),
        })
        .unwrap();
        handler.put(body, test_user())
    }

    fn test_user() -> AuthnUserInfo {
        AuthnUserInfo::new("admin".to_string(), vec!["ADMIN".to_string()])
    }

    #[test]
    fn test_put_feature() {
        let db = Arc::new(Database::new_test());
        let handler = FeaturesHandler::new(db.clone());

        let resp = put_feature(&handler, "PROJECT", "Project management");
        assert_eq!(resp.status(), StatusCode::OK);

        // Duplicate code is a conflict, without partial writes.
        let resp = put_feature(&handler, "PROJECT", "Another name");
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let total = db
            .with_transaction(|tx| tx.count_features(Query::default()))
            .unwrap();
        assert_eq!(total, 1);

        // Lowercase code is rejected by validation.
        let resp = put_feature(&handler, "project", "Project management");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_delete_feature_in_use() {
        let db = Arc::new(Database::new_test());
        let handler = FeaturesHandler::new(db.clone());

        put_feature(&handler, "PROJECT", "Project management");
        let feature = db
            .with_transaction(|tx| tx.get_feature_by_code("PROJECT"))
            .unwrap()
            .unwrap();

        db.with_transaction(|tx| {
            tx.create_permission(&portal_misc::api::permission::Permission {
                id: "perm-1".to_string(),
                role_id: "role-1".to_string(),
                role_code: "QA".to_string(),
                feature_id: feature.id.clone(),
                feature_code: "PROJECT".to_string(),
                operation: "list_projects".to_string(),
                create_time: 1,
                update_time: 1,
            })
        })
        .unwrap();

        let resp = handler.delete(Some(feature.id.clone()), None, test_user());
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        // Still present.
        let found = db.with_transaction(|tx| tx.get_feature(&feature.id)).unwrap();
        assert!(found.is_some());
    }
}
