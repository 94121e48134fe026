use std::sync::Arc;

use crate::auth::jwt::{JwtTokenGenerator, JwtTokenValidator};
use crate::config::ServerConfig;
use crate::db::Database;
use crate::policy::enforcer::Enforcer;
use crate::policy::store::PolicyStore;
use crate::routes::RouteTable;

/// Shared state of the running server. Built once at startup; the policy
/// store and enforcer live here so that middleware, synchronizer and admin
/// handlers all talk to the same instance.
pub struct ServerContext {
    pub db: Arc<Database>,

    pub store: Arc<PolicyStore>,
    pub enforcer: Enforcer,
    pub routes: Arc<RouteTable>,

    pub jwt_generator: JwtTokenGenerator,
    pub jwt_validator: JwtTokenValidator,

    pub cfg: ServerConfig,
}

impl ServerContext {
    #[cfg(test)]
    pub fn new_test() -> Self {
        let db = Arc::new(Database::new_test());
        let store = Arc::new(PolicyStore::new(db.clone()));
        store.load().unwrap();
        let enforcer = Enforcer::new(store.clone());
        let routes = Arc::new(RouteTable::new());
        crate::policy::sync::sync_operations(&db, &routes).unwrap();

        Self {
            db,
            store,
            enforcer,
            routes,
            jwt_generator: JwtTokenGenerator::new_test(),
            jwt_validator: JwtTokenValidator::new_test(),
            cfg: ServerConfig::default(),
        }
    }
}
