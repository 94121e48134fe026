use portal_misc::api::feature::{Feature, FeatureOperation};
use portal_misc::api::Query;

use crate::db::types::PatchFeatureParams;
use crate::db::Database;

pub fn run_feature_tests(db: &Database) {
    test_create(db);
    test_update(db);
    test_operations(db);
    test_list(db);
    test_delete(db);
}

fn test_create(db: &Database) {
    db.with_transaction(|tx| {
        for (id, code, name) in [
            ("feature-project", "PROJECT", "Project management"),
            ("feature-report", "REPORT", "Reporting"),
        ] {
            tx.create_feature(&Feature {
                id: id.to_string(),
                code: code.to_string(),
                name: name.to_string(),
                create_time: 50,
                update_time: 50,
            })?;
        }
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx| {
        let feature = tx.get_feature("feature-project")?.unwrap();
        assert_eq!(feature.code, "PROJECT");

        let feature = tx.get_feature_by_code("REPORT")?.unwrap();
        assert_eq!(feature.id, "feature-report");

        assert!(tx.get_feature("no-such-id")?.is_none());

        // Duplicate code violates the unique constraint.
        let result = tx.create_feature(&Feature {
            id: "feature-dup".to_string(),
            code: "PROJECT".to_string(),
            name: "Duplicate".to_string(),
            create_time: 60,
            update_time: 60,
        });
        assert!(result.is_err());
        Ok(())
    })
    .unwrap();
}

fn test_update(db: &Database) {
    db.with_transaction(|tx| {
        tx.update_feature(PatchFeatureParams {
            id: "feature-project".to_string(),
            name: Some("Projects".to_string()),
            update_time: 80,
        })?;
        let feature = tx.get_feature("feature-project")?.unwrap();
        assert_eq!(feature.name, "Projects");
        assert_eq!(feature.update_time, 80);
        Ok(())
    })
    .unwrap();
}

fn test_operations(db: &Database) {
    db.with_transaction(|tx| {
        let op = FeatureOperation {
            id: "op-list-projects".to_string(),
            feature_id: String::new(),
            feature_code: "PROJECT".to_string(),
            operation: "list_projects".to_string(),
            create_time: 50,
            update_time: 50,
        };
        tx.upsert_operation(&op)?;

        // Upserting again with a fresh id keeps the original entry.
        tx.upsert_operation(&FeatureOperation {
            id: "op-other-id".to_string(),
            feature_id: "feature-project".to_string(),
            feature_code: "PROJECT".to_string(),
            operation: "list_projects".to_string(),
            create_time: 70,
            update_time: 70,
        })?;

        let ops = tx.list_operations(None)?;
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].id, "op-list-projects");
        assert_eq!(ops[0].feature_id, "feature-project");
        assert_eq!(ops[0].update_time, 70);

        let found = tx.find_operation("feature-project", "list_projects")?;
        assert!(found.is_some());
        assert!(tx.find_operation("feature-project", "nope")?.is_none());

        Ok(())
    })
    .unwrap();
}

fn test_list(db: &Database) {
    db.with_transaction(|tx| {
        let total = tx.count_features(Query::default())?;
        assert_eq!(total, 2);

        let query = Query {
            search: Some("Projects".to_string()),
            ..Default::default()
        };
        assert_eq!(tx.count_features(query.clone())?, 1);
        let features = tx.list_features(query)?;
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].code, "PROJECT");
        Ok(())
    })
    .unwrap();
}

fn test_delete(db: &Database) {
    db.with_transaction(|tx| {
        tx.delete_feature("feature-report")?;
        assert!(tx.get_feature("feature-report")?.is_none());

        let detached = tx.detach_feature_operations("feature-project", 90)?;
        assert_eq!(detached, 1);
        let ops = tx.list_operations(Some("feature-project"))?;
        assert!(ops.is_empty());

        let adopted = tx.adopt_feature_operations("feature-project", "PROJECT", 95)?;
        assert_eq!(adopted, 1);
        Ok(())
    })
    .unwrap();
}
