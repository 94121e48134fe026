mod sql;
mod sqlite;

#[cfg(test)]
mod tests;

pub mod config;
pub mod types;

use std::cell::RefCell;
use std::sync::Mutex;

use anyhow::{bail, Result};
use portal_misc::api::feature::{Feature, FeatureOperation};
use portal_misc::api::permission::Permission;
use portal_misc::api::role::Role;
use portal_misc::api::session::Session;
use portal_misc::api::Query;
use sqlite::{SqliteConnection, SqliteTransaction};
use types::{
    Connection, PatchFeatureParams, PatchPermissionParams, PatchRoleParams, PatchUserParams,
    PolicyRuleRow, Transaction, UserRecord,
};

/// Process-wide database handle. The underlying connection is not thread
/// safe, so every transaction serializes through a mutex.
pub struct Database {
    conn: Mutex<RefCell<UnionConnection>>,
}

impl Database {
    pub fn new(conn: UnionConnection) -> Self {
        Self {
            conn: Mutex::new(RefCell::new(conn)),
        }
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        let conn = SqliteConnection::memory().unwrap();
        Self::new(UnionConnection::Sqlite(conn))
    }

    /// Runs `f` inside a transaction. Commits when `f` returns Ok, rolls
    /// back otherwise.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Transaction) -> Result<T>,
    {
        let conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(e) => bail!("failed to lock connection: {:#}", e),
        };
        let mut conn = conn.borrow_mut();
        let tx = conn.transaction()?;

        let result = f(&tx);

        if result.is_ok() {
            tx.commit()
        } else {
            tx.rollback()
        }?;

        result
    }
}

pub enum UnionConnection {
    Sqlite(SqliteConnection),
}

pub enum UnionTransaction<'a> {
    Sqlite(SqliteTransaction<'a>),
}

impl<'a> Connection<'a, UnionTransaction<'a>> for UnionConnection {
    fn transaction(&'a mut self) -> Result<UnionTransaction<'a>> {
        match self {
            UnionConnection::Sqlite(conn) => conn.transaction().map(UnionTransaction::Sqlite),
        }
    }
}

impl Transaction for UnionTransaction<'_> {
    fn create_feature(&self, feature: &Feature) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_feature(feature),
        }
    }

    fn update_feature(&self, params: PatchFeatureParams) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_feature(params),
        }
    }

    fn delete_feature(&self, id: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_feature(id),
        }
    }

    fn get_feature(&self, id: &str) -> Result<Option<Feature>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_feature(id),
        }
    }

    fn get_feature_by_code(&self, code: &str) -> Result<Option<Feature>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_feature_by_code(code),
        }
    }

    fn count_features(&self, query: Query) -> Result<u64> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.count_features(query),
        }
    }

    fn list_features(&self, query: Query) -> Result<Vec<Feature>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_features(query),
        }
    }

    fn upsert_operation(&self, op: &FeatureOperation) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.upsert_operation(op),
        }
    }

    fn find_operation(
        &self,
        feature_id: &str,
        operation: &str,
    ) -> Result<Option<FeatureOperation>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.find_operation(feature_id, operation),
        }
    }

    fn list_operations(&self, feature_id: Option<&str>) -> Result<Vec<FeatureOperation>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_operations(feature_id),
        }
    }

    fn detach_feature_operations(&self, feature_id: &str, update_time: u64) -> Result<u64> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.detach_feature_operations(feature_id, update_time),
        }
    }

    fn adopt_feature_operations(
        &self,
        feature_id: &str,
        feature_code: &str,
        update_time: u64,
    ) -> Result<u64> {
        match self {
            UnionTransaction::Sqlite(tx) => {
                tx.adopt_feature_operations(feature_id, feature_code, update_time)
            }
        }
    }

    fn create_role(&self, role: &Role) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_role(role),
        }
    }

    fn update_role(&self, params: PatchRoleParams) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_role(params),
        }
    }

    fn delete_role(&self, id: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_role(id),
        }
    }

    fn get_role(&self, id: &str) -> Result<Option<Role>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_role(id),
        }
    }

    fn get_role_by_code(&self, code: &str) -> Result<Option<Role>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_role_by_code(code),
        }
    }

    fn has_role_name(&self, name: &str) -> Result<bool> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.has_role_name(name),
        }
    }

    fn count_roles(&self, query: Query) -> Result<u64> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.count_roles(query),
        }
    }

    fn list_roles(&self, query: Query) -> Result<Vec<Role>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_roles(query),
        }
    }

    fn is_role_in_use(&self, id: &str) -> Result<bool> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.is_role_in_use(id),
        }
    }

    fn create_user(&self, user: &UserRecord) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_user(user),
        }
    }

    fn update_user(&self, params: PatchUserParams) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_user(params),
        }
    }

    fn delete_user(&self, id: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_user(id),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_user(id),
        }
    }

    fn get_user_by_name(&self, name: &str) -> Result<Option<UserRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_user_by_name(name),
        }
    }

    fn count_users(&self, query: Query) -> Result<u64> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.count_users(query),
        }
    }

    fn list_users(&self, query: Query) -> Result<Vec<UserRecord>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_users(query),
        }
    }

    fn create_user_role(&self, user_id: &str, role_id: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_user_role(user_id, role_id),
        }
    }

    fn delete_user_roles(&self, user_id: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_user_roles(user_id),
        }
    }

    fn list_user_roles(&self, user_id: &str) -> Result<Vec<Role>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_user_roles(user_id),
        }
    }

    fn list_subject_groupings(&self) -> Result<Vec<(String, String)>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_subject_groupings(),
        }
    }

    fn create_permission(&self, perm: &Permission) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_permission(perm),
        }
    }

    fn update_permission(&self, params: PatchPermissionParams) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.update_permission(params),
        }
    }

    fn delete_permission(&self, id: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_permission(id),
        }
    }

    fn get_permission(&self, id: &str) -> Result<Option<Permission>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_permission(id),
        }
    }

    fn has_permission_tuple(
        &self,
        role_code: &str,
        feature_code: &str,
        operation: &str,
    ) -> Result<bool> {
        match self {
            UnionTransaction::Sqlite(tx) => {
                tx.has_permission_tuple(role_code, feature_code, operation)
            }
        }
    }

    fn list_permissions(&self, role_code: Option<&str>) -> Result<Vec<Permission>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_permissions(role_code),
        }
    }

    fn has_feature_permissions(&self, feature_code: &str) -> Result<bool> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.has_feature_permissions(feature_code),
        }
    }

    fn delete_role_permissions(&self, role_id: &str) -> Result<u64> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_role_permissions(role_id),
        }
    }

    fn create_session(&self, session: &Session) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_session(session),
        }
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_session(id),
        }
    }

    fn get_session_by_refresh_token(&self, refresh_token: &str) -> Result<Option<Session>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_session_by_refresh_token(refresh_token),
        }
    }

    fn touch_session(&self, id: &str, last_access: u64) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.touch_session(id, last_access),
        }
    }

    fn rotate_session_token(
        &self,
        id: &str,
        refresh_token: &str,
        last_access: u64,
    ) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => {
                tx.rotate_session_token(id, refresh_token, last_access)
            }
        }
    }

    fn set_session_status(&self, id: &str, status: u32, update_time: u64) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.set_session_status(id, status, update_time),
        }
    }

    fn delete_session(&self, id: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_session(id),
        }
    }

    fn count_sessions(&self, query: Query) -> Result<u64> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.count_sessions(query),
        }
    }

    fn list_sessions(&self, query: Query) -> Result<Vec<Session>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_sessions(query),
        }
    }

    fn expire_sessions_before(&self, last_access_before: u64, update_time: u64) -> Result<u64> {
        match self {
            UnionTransaction::Sqlite(tx) => {
                tx.expire_sessions_before(last_access_before, update_time)
            }
        }
    }

    fn replace_policy_rules(&self, rows: &[PolicyRuleRow]) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.replace_policy_rules(rows),
        }
    }

    fn load_policy_rules(&self) -> Result<Vec<PolicyRuleRow>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.load_policy_rules(),
        }
    }

    fn commit(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.commit(),
        }
    }

    fn rollback(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.rollback(),
        }
    }
}
