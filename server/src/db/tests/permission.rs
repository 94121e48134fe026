use portal_misc::api::permission::Permission;

use crate::db::types::PatchPermissionParams;
use crate::db::Database;

pub fn run_permission_tests(db: &Database) {
    test_create(db);
    test_update(db);
    test_delete(db);
}

fn perm(id: &str, role_code: &str, operation: &str) -> Permission {
    Permission {
        id: id.to_string(),
        role_id: format!("role-{}", role_code.to_lowercase()),
        role_code: role_code.to_string(),
        feature_id: "feature-project".to_string(),
        feature_code: "PROJECT".to_string(),
        operation: operation.to_string(),
        create_time: 50,
        update_time: 50,
    }
}

fn test_create(db: &Database) {
    db.with_transaction(|tx| {
        tx.create_permission(&perm("perm-1", "QA", "list_projects"))?;
        tx.create_permission(&perm("perm-2", "QA", "view_projects"))?;
        tx.create_permission(&perm("perm-3", "DEV", "list_projects"))?;
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx| {
        let found = tx.get_permission("perm-1")?.unwrap();
        assert_eq!(found.role_code, "QA");
        assert_eq!(found.operation, "list_projects");

        assert!(tx.has_permission_tuple("QA", "PROJECT", "list_projects")?);
        assert!(!tx.has_permission_tuple("QA", "PROJECT", "delete_project")?);

        assert_eq!(tx.list_permissions(Some("QA"))?.len(), 2);
        assert_eq!(tx.list_permissions(None)?.len(), 3);

        assert!(tx.has_feature_permissions("PROJECT")?);
        assert!(!tx.has_feature_permissions("REPORT")?);
        Ok(())
    })
    .unwrap();

    // The (role, feature, operation) tuple is unique.
    let result = db.with_transaction(|tx| {
        tx.create_permission(&perm("perm-dup", "QA", "list_projects"))
    });
    assert!(result.is_err());
}

fn test_update(db: &Database) {
    db.with_transaction(|tx| {
        tx.update_permission(PatchPermissionParams {
            id: "perm-2".to_string(),
            role_id: "role-qa".to_string(),
            role_code: "QA".to_string(),
            feature_id: "feature-project".to_string(),
            feature_code: "PROJECT".to_string(),
            operation: "export_projects".to_string(),
            update_time: 80,
        })?;
        let found = tx.get_permission("perm-2")?.unwrap();
        assert_eq!(found.operation, "export_projects");
        assert_eq!(found.update_time, 80);
        Ok(())
    })
    .unwrap();
}

fn test_delete(db: &Database) {
    db.with_transaction(|tx| {
        tx.delete_permission("perm-2")?;
        assert!(tx.get_permission("perm-2")?.is_none());

        let deleted = tx.delete_role_permissions("role-qa")?;
        assert_eq!(deleted, 1);
        let deleted = tx.delete_role_permissions("role-dev")?;
        assert_eq!(deleted, 1);
        assert!(tx.list_permissions(None)?.is_empty());
        Ok(())
    })
    .unwrap();
}
