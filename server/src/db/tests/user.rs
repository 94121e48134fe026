use portal_misc::api::Query;

use crate::db::types::{PatchUserParams, UserRecord};
use crate::db::Database;

pub fn run_user_tests(db: &Database) {
    test_create(db);
    test_update(db);
    test_roles(db);
    test_delete(db);
}

fn record(id: &str, name: &str, active: bool) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        name: name.to_string(),
        email: None,
        hash: format!("hash-{name}"),
        salt: format!("salt-{name}"),
        is_active: active,
        create_time: 50,
        update_time: 50,
    }
}

fn test_create(db: &Database) {
    db.with_transaction(|tx| {
        tx.create_user(&record("user-white", "white", true))?;
        tx.create_user(&record("user-black", "black", true))?;
        tx.create_user(&record("user-frozen", "frozen", false))?;
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx| {
        let user = tx.get_user("user-white")?.unwrap();
        assert_eq!(user.name, "white");
        assert_eq!(user.hash, "hash-white");

        let user = tx.get_user_by_name("black")?.unwrap();
        assert_eq!(user.id, "user-black");

        assert!(tx.get_user_by_name("nobody")?.is_none());
        assert_eq!(tx.count_users(Query::default())?, 3);
        Ok(())
    })
    .unwrap();
}

fn test_update(db: &Database) {
    db.with_transaction(|tx| {
        tx.update_user(PatchUserParams {
            id: "user-white".to_string(),
            email: Some("white@example.com".to_string()),
            secret: Some(("new-hash".to_string(), "new-salt".to_string())),
            is_active: None,
            update_time: 80,
        })?;
        let user = tx.get_user("user-white")?.unwrap();
        assert_eq!(user.email.as_deref(), Some("white@example.com"));
        assert_eq!(user.hash, "new-hash");
        assert_eq!(user.salt, "new-salt");
        assert!(user.is_active);
        Ok(())
    })
    .unwrap();
}

fn test_roles(db: &Database) {
    db.with_transaction(|tx| {
        tx.create_user_role("user-white", "role-qa")?;
        tx.create_user_role("user-white", "role-dev")?;
        // Assigning the same role twice keeps one row.
        tx.create_user_role("user-white", "role-qa")?;
        tx.create_user_role("user-frozen", "role-qa")?;

        let roles = tx.list_user_roles("user-white")?;
        assert_eq!(roles.len(), 2);

        assert!(tx.is_role_in_use("role-qa")?);
        assert!(!tx.is_role_in_use("role-none")?);

        // Only active users and active roles contribute groupings; the
        // frozen user and the deactivated DEV role are filtered out.
        let pairs = tx.list_subject_groupings()?;
        assert_eq!(pairs, vec![("white".to_string(), "QA".to_string())]);

        tx.delete_user_roles("user-white")?;
        assert!(tx.list_user_roles("user-white")?.is_empty());
        tx.delete_user_roles("user-frozen")?;
        Ok(())
    })
    .unwrap();
}

fn test_delete(db: &Database) {
    db.with_transaction(|tx| {
        tx.delete_user("user-black")?;
        assert!(tx.get_user("user-black")?.is_none());
        Ok(())
    })
    .unwrap();
}
