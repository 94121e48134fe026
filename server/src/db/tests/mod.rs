mod feature;
mod permission;
mod role;
mod user;

use anyhow::{bail, Result};
use portal_misc::api::role::Role;

use super::Database;

#[test]
fn test_sqlite() {
    let db = Database::new_test();
    run_tests(&db);
}

pub fn run_tests(db: &Database) {
    feature::run_feature_tests(db);
    role::run_role_tests(db);
    user::run_user_tests(db);
    permission::run_permission_tests(db);
    session::run_session_tests(db);

    test_rollback(db);
}

fn test_rollback(db: &Database) {
    let result: Result<()> = db.with_transaction(|tx| {
        tx.create_role(&Role {
            id: String::from("role-rollback"),
            name: String::from("Rollback role"),
            code: String::from("ROLLBACK"),
            is_active: true,
            create_time: 50,
            update_time: 50,
        })
        .unwrap();

        bail!("rollback");
    });
    assert!(result.is_err());

    db.with_transaction(|tx| {
        assert!(tx.get_role("role-rollback")?.is_none());
        Ok(())
    })
    .unwrap();
}
