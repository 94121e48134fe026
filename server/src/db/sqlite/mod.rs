mod feature;
mod operation;
mod permission;
mod policy;
mod role;
mod session;
mod user;

use std::path::Path;

use anyhow::Result;
use portal_misc::api::feature::{Feature, FeatureOperation};
use portal_misc::api::permission::Permission;
use portal_misc::api::role::Role;
use portal_misc::api::session::Session;
use portal_misc::api::Query;
use rusqlite::types::Value as DbValue;
use rusqlite::Connection as RawConnection;
use rusqlite::Transaction as RawTransaction;

use super::sql::Value;
use super::types::{
    Connection, PatchFeatureParams, PatchPermissionParams, PatchRoleParams, PatchUserParams,
    PolicyRuleRow, Transaction, UserRecord,
};

/// SQLite-based database implementation. This is the simplest database type,
/// perfect for single-node deployments. Supports both file-based and
/// in-memory database types.
pub struct SqliteConnection {
    conn: RawConnection,
}

/// SQLite transaction for executing database operations
pub struct SqliteTransaction<'a> {
    tx: RawTransaction<'a>,
}

impl SqliteConnection {
    /// Opens a SQLite database file. Creates one if it doesn't exist.
    /// Also initializes all required database tables.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = RawConnection::open(path)?;
        Self::init_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Creates a new in-memory database. Content is lost when the process
    /// exits. Recommended for testing only.
    pub fn memory() -> Result<Self> {
        let conn = RawConnection::open_in_memory()?;
        Self::init_tables(&conn)?;
        Ok(Self { conn })
    }

    fn init_tables(conn: &RawConnection) -> Result<()> {
        feature::create_table(conn)?;
        operation::create_table(conn)?;
        role::create_table(conn)?;
        user::create_tables(conn)?;
        permission::create_table(conn)?;
        session::create_table(conn)?;
        policy::create_table(conn)?;
        Ok(())
    }
}

impl<'a> Connection<'a, SqliteTransaction<'a>> for SqliteConnection {
    fn transaction(&'a mut self) -> Result<SqliteTransaction<'a>> {
        let tx = self.conn.transaction()?;
        Ok(SqliteTransaction { tx })
    }
}

pub(super) fn convert_values(values: Vec<Value>) -> Vec<DbValue> {
    values
        .into_iter()
        .map(|value| match value {
            Value::Text(text) => DbValue::Text(text),
            Value::Integer(integer) => DbValue::Integer(integer as i64),
            Value::Bool(boolean) => DbValue::Integer(boolean as i64),
        })
        .collect()
}

impl Transaction for SqliteTransaction<'_> {
    fn create_feature(&self, feature: &Feature) -> Result<()> {
        feature::create(&self.tx, feature)
    }

    fn update_feature(&self, params: PatchFeatureParams) -> Result<()> {
        feature::update(&self.tx, params)
    }

    fn delete_feature(&self, id: &str) -> Result<()> {
        feature::delete(&self.tx, id)
    }

    fn get_feature(&self, id: &str) -> Result<Option<Feature>> {
        feature::get(&self.tx, id)
    }

    fn get_feature_by_code(&self, code: &str) -> Result<Option<Feature>> {
        feature::get_by_code(&self.tx, code)
    }

    fn count_features(&self, query: Query) -> Result<u64> {
        feature::count(&self.tx, query)
    }

    fn list_features(&self, query: Query) -> Result<Vec<Feature>> {
        feature::list(&self.tx, query)
    }

    fn upsert_operation(&self, op: &FeatureOperation) -> Result<()> {
        operation::upsert(&self.tx, op)
    }

    fn find_operation(
        &self,
        feature_id: &str,
        operation: &str,
    ) -> Result<Option<FeatureOperation>> {
        operation::find(&self.tx, feature_id, operation)
    }

    fn list_operations(&self, feature_id: Option<&str>) -> Result<Vec<FeatureOperation>> {
        operation::list(&self.tx, feature_id)
    }

    fn detach_feature_operations(&self, feature_id: &str, update_time: u64) -> Result<u64> {
        operation::detach_feature(&self.tx, feature_id, update_time)
    }

    fn adopt_feature_operations(
        &self,
        feature_id: &str,
        feature_code: &str,
        update_time: u64,
    ) -> Result<u64> {
        operation::adopt_feature(&self.tx, feature_id, feature_code, update_time)
    }

    fn create_role(&self, role: &Role) -> Result<()> {
        role::create(&self.tx, role)
    }

    fn update_role(&self, params: PatchRoleParams) -> Result<()> {
        role::update(&self.tx, params)
    }

    fn delete_role(&self, id: &str) -> Result<()> {
        role::delete(&self.tx, id)
    }

    fn get_role(&self, id: &str) -> Result<Option<Role>> {
        role::get(&self.tx, id)
    }

    fn get_role_by_code(&self, code: &str) -> Result<Option<Role>> {
        role::get_by_code(&self.tx, code)
    }

    fn has_role_name(&self, name: &str) -> Result<bool> {
        role::has_name(&self.tx, name)
    }

    fn count_roles(&self, query: Query) -> Result<u64> {
        role::count(&self.tx, query)
    }

    fn list_roles(&self, query: Query) -> Result<Vec<Role>> {
        role::list(&self.tx, query)
    }

    fn is_role_in_use(&self, id: &str) -> Result<bool> {
        user::is_role_assigned(&self.tx, id)
    }

    fn create_user(&self, user: &UserRecord) -> Result<()> {
        user::create(&self.tx, user)
    }

    fn update_user(&self, params: PatchUserParams) -> Result<()> {
        user::update(&self.tx, params)
    }

    fn delete_user(&self, id: &str) -> Result<()> {
        user::delete(&self.tx, id)
    }

    fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        user::get(&self.tx, id)
    }

    fn get_user_by_name(&self, name: &str) -> Result<Option<UserRecord>> {
        user::get_by_name(&self.tx, name)
    }

    fn count_users(&self, query: Query) -> Result<u64> {
        user::count(&self.tx, query)
    }

    fn list_users(&self, query: Query) -> Result<Vec<UserRecord>> {
        user::list(&self.tx, query)
    }

    fn create_user_role(&self, user_id: &str, role_id: &str) -> Result<()> {
        user::create_user_role(&self.tx, user_id, role_id)
    }

    fn delete_user_roles(&self, user_id: &str) -> Result<()> {
        user::delete_user_roles(&self.tx, user_id)
    }

    fn list_user_roles(&self, user_id: &str) -> Result<Vec<Role>> {
        user::list_user_roles(&self.tx, user_id)
    }

    fn list_subject_groupings(&self) -> Result<Vec<(String, String)>> {
        user::list_subject_groupings(&self.tx)
    }

    fn create_permission(&self, perm: &Permission) -> Result<()> {
        permission::create(&self.tx, perm)
    }

    fn update_permission(&self, params: PatchPermissionParams) -> Result<()> {
        permission::update(&self.tx, params)
    }

    fn delete_permission(&self, id: &str) -> Result<()> {
        permission::delete(&self.tx, id)
    }

    fn get_permission(&self, id: &str) -> Result<Option<Permission>> {
        permission::get(&self.tx, id)
    }

    fn has_permission_tuple(
        &self,
        role_code: &str,
        feature_code: &str,
        operation: &str,
    ) -> Result<bool> {
        permission::has_tuple(&self.tx, role_code, feature_code, operation)
    }

    fn list_permissions(&self, role_code: Option<&str>) -> Result<Vec<Permission>> {
        permission::list(&self.tx, role_code)
    }

    fn has_feature_permissions(&self, feature_code: &str) -> Result<bool> {
        permission::has_feature(&self.tx, feature_code)
    }

    fn delete_role_permissions(&self, role_id: &str) -> Result<u64> {
        permission::delete_for_role(&self.tx, role_id)
    }

    fn create_session(&self, session: &Session) -> Result<()> {
        session::create(&self.tx, session)
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>> {
        session::get(&self.tx, id)
    }

    fn get_session_by_refresh_token(&self, refresh_token: &str) -> Result<Option<Session>> {
        session::get_by_refresh_token(&self.tx, refresh_token)
    }

    fn touch_session(&self, id: &str, last_access: u64) -> Result<()> {
        session::touch(&self.tx, id, last_access)
    }

    fn rotate_session_token(
        &self,
        id: &str,
        refresh_token: &str,
        last_access: u64,
    ) -> Result<()> {
        session::rotate_token(&self.tx, id, refresh_token, last_access)
    }

    fn set_session_status(&self, id: &str, status: u32, update_time: u64) -> Result<()> {
        session::set_status(&self.tx, id, status, update_time)
    }

    fn delete_session(&self, id: &str) -> Result<()> {
        session::delete(&self.tx, id)
    }

    fn count_sessions(&self, query: Query) -> Result<u64> {
        session::count(&self.tx, query)
    }

    fn list_sessions(&self, query: Query) -> Result<Vec<Session>> {
        session::list(&self.tx, query)
    }

    fn expire_sessions_before(&self, last_access_before: u64, update_time: u64) -> Result<u64> {
        session::expire_before(&self.tx, last_access_before, update_time)
    }

    fn replace_policy_rules(&self, rows: &[PolicyRuleRow]) -> Result<()> {
        policy::replace(&self.tx, rows)
    }

    fn load_policy_rules(&self) -> Result<Vec<PolicyRuleRow>> {
        policy::load(&self.tx)
    }

    fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }
}
