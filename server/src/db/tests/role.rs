use portal_misc::api::role::Role;
use portal_misc::api::Query;

use crate::db::types::PatchRoleParams;
use crate::db::Database;

pub fn run_role_tests(db: &Database) {
    test_create(db);
    test_update(db);
    test_list(db);
    test_delete(db);
}

fn test_create(db: &Database) {
    db.with_transaction(|tx| {
        for (id, name, code) in [
            ("role-qa", "QA engineers", "QA"),
            ("role-dev", "Developers", "DEV"),
            ("role-gone", "Leavers", "GONE"),
        ] {
            tx.create_role(&Role {
                id: id.to_string(),
                name: name.to_string(),
                code: code.to_string(),
                is_active: true,
                create_time: 50,
                update_time: 50,
            })?;
        }
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx| {
        let role = tx.get_role("role-qa")?.unwrap();
        assert_eq!(role.code, "QA");
        assert!(role.is_active);

        let role = tx.get_role_by_code("DEV")?.unwrap();
        assert_eq!(role.id, "role-dev");

        assert!(tx.has_role_name("QA engineers")?);
        assert!(!tx.has_role_name("Ghosts")?);
        Ok(())
    })
    .unwrap();
}

fn test_update(db: &Database) {
    db.with_transaction(|tx| {
        tx.update_role(PatchRoleParams {
            id: "role-dev".to_string(),
            name: Some("Software developers".to_string()),
            is_active: Some(false),
            update_time: 80,
        })?;
        let role = tx.get_role("role-dev")?.unwrap();
        assert_eq!(role.name, "Software developers");
        assert!(!role.is_active);
        Ok(())
    })
    .unwrap();
}

fn test_list(db: &Database) {
    db.with_transaction(|tx| {
        assert_eq!(tx.count_roles(Query::default())?, 3);

        let query = Query {
            page: 1,
            page_size: 2,
            ..Default::default()
        };
        let roles = tx.list_roles(query)?;
        assert_eq!(roles.len(), 2);
        Ok(())
    })
    .unwrap();
}

fn test_delete(db: &Database) {
    db.with_transaction(|tx| {
        tx.delete_role("role-gone")?;
        assert!(tx.get_role("role-gone")?.is_none());

        // Deleting a missing role is a no-op.
        tx.delete_role("role-gone")?;
        Ok(())
    })
    .unwrap();
}
