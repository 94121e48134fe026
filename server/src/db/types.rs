use anyhow::Result;
use portal_misc::api::feature::{Feature, FeatureOperation};
use portal_misc::api::permission::Permission;
use portal_misc::api::role::Role;
use portal_misc::api::session::Session;
use portal_misc::api::Query;

pub trait Connection<'a, T>
where
    T: Transaction + 'a,
{
    fn transaction(&'a mut self) -> Result<T>;
}

/// All database operations available inside a transaction. Every call either
/// commits as a whole through [`Transaction::commit`] or is rolled back.
pub trait Transaction {
    fn create_feature(&self, feature: &Feature) -> Result<()>;
    fn update_feature(&self, params: PatchFeatureParams) -> Result<()>;
    fn delete_feature(&self, id: &str) -> Result<()>;
    fn get_feature(&self, id: &str) -> Result<Option<Feature>>;
    fn get_feature_by_code(&self, code: &str) -> Result<Option<Feature>>;
    fn count_features(&self, query: Query) -> Result<u64>;
    fn list_features(&self, query: Query) -> Result<Vec<Feature>>;

    fn upsert_operation(&self, op: &FeatureOperation) -> Result<()>;
    fn find_operation(&self, feature_id: &str, operation: &str)
        -> Result<Option<FeatureOperation>>;
    fn list_operations(&self, feature_id: Option<&str>) -> Result<Vec<FeatureOperation>>;
    fn detach_feature_operations(&self, feature_id: &str, update_time: u64) -> Result<u64>;
    /// Links orphaned registry entries carrying the given code to a newly
    /// created feature.
    fn adopt_feature_operations(
        &self,
        feature_id: &str,
        feature_code: &str,
        update_time: u64,
    ) -> Result<u64>;

    fn create_role(&self, role: &Role) -> Result<()>;
    fn update_role(&self, params: PatchRoleParams) -> Result<()>;
    fn delete_role(&self, id: &str) -> Result<()>;
    fn get_role(&self, id: &str) -> Result<Option<Role>>;
    fn get_role_by_code(&self, code: &str) -> Result<Option<Role>>;
    fn has_role_name(&self, name: &str) -> Result<bool>;
    fn count_roles(&self, query: Query) -> Result<u64>;
    fn list_roles(&self, query: Query) -> Result<Vec<Role>>;
    fn is_role_in_use(&self, id: &str) -> Result<bool>;

    fn create_user(&self, user: &UserRecord) -> Result<()>;
    fn update_user(&self, params: PatchUserParams) -> Result<()>;
    fn delete_user(&self, id: &str) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<UserRecord>>;
    fn get_user_by_name(&self, name: &str) -> Result<Option<UserRecord>>;
    fn count_users(&self, query: Query) -> Result<u64>;
    fn list_users(&self, query: Query) -> Result<Vec<UserRecord>>;

    fn create_user_role(&self, user_id: &str, role_id: &str) -> Result<()>;
    fn delete_user_roles(&self, user_id: &str) -> Result<()>;
    fn list_user_roles(&self, user_id: &str) -> Result<Vec<Role>>;
    /// All (username, role_code) pairs for active users and active roles,
    /// used to derive grouping rules.
    fn list_subject_groupings(&self) -> Result<Vec<(String, String)>>;

    fn create_permission(&self, perm: &Permission) -> Result<()>;
    fn update_permission(&self, params: PatchPermissionParams) -> Result<()>;
    fn delete_permission(&self, id: &str) -> Result<()>;
    fn get_permission(&self, id: &str) -> Result<Option<Permission>>;
    fn has_permission_tuple(
        &self,
        role_code: &str,
        feature_code: &str,
        operation: &str,
    ) -> Result<bool>;
    fn list_permissions(&self, role_code: Option<&str>) -> Result<Vec<Permission>>;
    fn has_feature_permissions(&self, feature_code: &str) -> Result<bool>;
    fn delete_role_permissions(&self, role_id: &str) -> Result<u64>;

    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session(&self, id: &str) -> Result<Option<Session>>;
    fn get_session_by_refresh_token(&self, refresh_token: &str) -> Result<Option<Session>>;
    fn touch_session(&self, id: &str, last_access: u64) -> Result<()>;
    /// Stores a rotated refresh token and bumps the access time.
    fn rotate_session_token(&self, id: &str, refresh_token: &str, last_access: u64) -> Result<()>;
    fn set_session_status(&self, id: &str, status: u32, update_time: u64) -> Result<()>;
    fn delete_session(&self, id: &str) -> Result<()>;
    fn count_sessions(&self, query: Query) -> Result<u64>;
    fn list_sessions(&self, query: Query) -> Result<Vec<Session>>;
    fn expire_sessions_before(&self, last_access_before: u64, update_time: u64) -> Result<u64>;

    fn replace_policy_rules(&self, rows: &[PolicyRuleRow]) -> Result<()>;
    fn load_policy_rules(&self) -> Result<Vec<PolicyRuleRow>>;

    fn commit(self) -> Result<()>
    where
        Self: Sized;
    fn rollback(self) -> Result<()>
    where
        Self: Sized;
}

/// A user row. The password hash is sha256(password + salt).
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub hash: String,
    pub salt: String,
    pub is_active: bool,

    pub create_time: u64,
    pub update_time: u64,
}

#[derive(Debug, Default)]
pub struct PatchFeatureParams {
    pub id: String,
    pub name: Option<String>,
    pub update_time: u64,
}

#[derive(Debug, Default)]
pub struct PatchRoleParams {
    pub id: String,
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub update_time: u64,
}

#[derive(Debug, Default)]
pub struct PatchUserParams {
    pub id: String,
    pub email: Option<String>,
    /// New password hash and salt, replacing the stored pair.
    pub secret: Option<(String, String)>,
    pub is_active: Option<bool>,
    pub update_time: u64,
}

/// Full replacement values for one permission row; the handlers resolve the
/// new tuple before calling this.
#[derive(Debug, Default)]
pub struct PatchPermissionParams {
    pub id: String,
    pub role_id: String,
    pub role_code: String,
    pub feature_id: String,
    pub feature_code: String,
    pub operation: String,
    pub update_time: u64,
}

pub const POLICY_KIND_PERMISSION: &str = "p";
pub const POLICY_KIND_GROUPING: &str = "g";

/// Durable form of one policy store rule. Permission rules fill all three
/// value columns with (role_code, feature_code, operation); grouping rules
/// fill v0/v1 with (subject, role_code) and leave v2 empty.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyRuleRow {
    pub kind: String,
    pub v0: String,
    pub v1: String,
    pub v2: String,
}
