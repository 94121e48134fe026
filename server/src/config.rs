use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslMethod};
use portal_misc::api::role::ADMIN_ROLE_CODE;
use portal_misc::api::user::ADMIN_USER;
use portal_misc::config::{CommonConfig, PathSet};
use portal_misc::logs::LogsConfig;
use portal_misc::{code, rsa, time};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::jwt::{JwtTokenGenerator, JwtTokenValidator};
use crate::authz::config::AuthzConfig;
use crate::context::ServerContext;
use crate::db::config::DbConfig;
use crate::db::types::UserRecord;
use crate::db::Database;
use crate::handlers::api::ApiHandler;
use crate::handlers::healthz::HealthzHandler;
use crate::handlers::login::LoginHandler;
use crate::policy::enforcer::Enforcer;
use crate::policy::store::PolicyStore;
use crate::policy::sync;
use crate::restful::{RestfulContext, RestfulServer};
use crate::routes::RouteTable;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_bind")]
    pub bind: String,

    #[serde(default)]
    pub ssl: bool,

    /// Password of the bootstrap administrator account, created on first
    /// start together with the ADMIN role.
    #[serde(default = "ServerConfig::default_admin_password")]
    pub admin_password: String,

    #[serde(default = "ServerConfig::default_salt_length")]
    pub salt_length: usize,

    #[serde(default)]
    pub db: DbConfig,

    #[serde(default)]
    pub authz: AuthzConfig,

    pub keep_alive_secs: Option<u64>,

    pub workers: Option<u64>,

    pub payload_limit_mib: Option<u64>,

    #[serde(default = "ServerConfig::default_access_token_expiry_secs")]
    pub access_token_expiry_secs: u64,

    #[serde(default = "ServerConfig::default_refresh_token_expiry_secs")]
    pub refresh_token_expiry_secs: u64,

    /// Active sessions whose last access is older than this are expired by
    /// the recycle loop.
    #[serde(default = "ServerConfig::default_session_recycle_hours")]
    pub session_recycle_hours: u64,

    #[serde(default)]
    pub logs: LogsConfig,

    #[serde(skip)]
    pki_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: Self::default_bind(),
            ssl: false,
            admin_password: Self::default_admin_password(),
            salt_length: Self::default_salt_length(),
            db: DbConfig::default(),
            authz: AuthzConfig::default(),
            keep_alive_secs: None,
            workers: None,
            payload_limit_mib: None,
            access_token_expiry_secs: Self::default_access_token_expiry_secs(),
            refresh_token_expiry_secs: Self::default_refresh_token_expiry_secs(),
            session_recycle_hours: Self::default_session_recycle_hours(),
            logs: LogsConfig::default(),
            pki_dir: PathBuf::new(),
        }
    }
}

impl CommonConfig for ServerConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if self.bind.is_empty() {
            bail!("bind is required");
        }

        if self.admin_password.is_empty() {
            bail!("admin_password is required");
        }

        if self.salt_length < Self::MIN_SALT_LENGTH || self.salt_length > Self::MAX_SALT_LENGTH {
            bail!(
                "salt_length must be in range [{}, {}]",
                Self::MIN_SALT_LENGTH,
                Self::MAX_SALT_LENGTH
            );
        }

        self.db.complete(ps).context("db")?;
        self.authz.complete(ps).context("authz")?;

        if let Some(keep_alive_secs) = self.keep_alive_secs {
            if keep_alive_secs == 0 {
                bail!("keep_alive_secs must be greater than 0");
            }
        }

        if let Some(workers) = self.workers {
            if workers == 0 {
                bail!("workers must be greater than 0");
            }
        }

        if let Some(payload_limit_mib) = self.payload_limit_mib {
            if payload_limit_mib == 0 {
                bail!("payload_limit_mib must be greater than 0");
            }
        }

        if self.access_token_expiry_secs < Self::MIN_TOKEN_EXPIRY_SECS
            || self.access_token_expiry_secs > Self::MAX_TOKEN_EXPIRY_SECS
        {
            bail!(
                "access_token_expiry_secs must be in range [{}, {}]",
                Self::MIN_TOKEN_EXPIRY_SECS,
                Self::MAX_TOKEN_EXPIRY_SECS
            );
        }
        if self.refresh_token_expiry_secs <= self.access_token_expiry_secs {
            bail!("refresh_token_expiry_secs must be greater than access_token_expiry_secs");
        }

        if self.session_recycle_hours == 0 {
            bail!("session_recycle_hours is required");
        }

        self.logs.complete(ps).context("logs")?;

        self.pki_dir = ps.pki_dir.clone();

        Ok(())
    }
}

impl ServerConfig {
    const MIN_SALT_LENGTH: usize = 8;
    const MAX_SALT_LENGTH: usize = 100;

    const MIN_TOKEN_EXPIRY_SECS: u64 = 60;
    const MAX_TOKEN_EXPIRY_SECS: u64 = 60 * 60 * 24 * 365;

    /// Builds the full server context: database, bootstrap rows, operation
    /// registry sync, policy store load plus rebuild, token layer.
    pub fn build_ctx(&self) -> Result<Arc<ServerContext>> {
        let db = Arc::new(self.db.build().context("init database")?);

        self.bootstrap_admin(&db).context("bootstrap admin")?;

        let routes = Arc::new(RouteTable::new());
        sync::sync_operations(&db, &routes).context("sync operation registry")?;

        // Load the durable rules, then re-derive them from the relational
        // tables: the store is a pure projection, and any divergence left by
        // a partial failure is logged and repaired here.
        let store = Arc::new(PolicyStore::new(db.clone()));
        store.load().context("load policy store")?;
        sync::rebuild_policies(&db, &store).context("rebuild policy store")?;

        let enforcer = Enforcer::new(store.clone());

        let (token_public, token_private) = self.read_jwt_keys()?;
        let jwt_generator = JwtTokenGenerator::new(
            &token_private,
            self.access_token_expiry_secs,
            self.refresh_token_expiry_secs,
        )
        .context("init jwt token generator")?;
        let jwt_validator =
            JwtTokenValidator::new(&token_public).context("init jwt token validator")?;

        let ctx = ServerContext {
            db,
            store,
            enforcer,
            routes,
            jwt_generator,
            jwt_validator,
            cfg: self.clone(),
        };
        Ok(Arc::new(ctx))
    }

    pub fn build_restful_server(&self, ctx: Arc<ServerContext>) -> Result<RestfulServer> {
        let restful_ctx = RestfulContext {
            api_handler: ApiHandler::new(ctx.clone()),
            healthz_handler: HealthzHandler::new(),
            login_handler: LoginHandler::new(ctx),
        };

        let ssl = if self.ssl {
            Some(self.build_ssl()?)
        } else {
            None
        };

        let mut srv = RestfulServer::new(
            self.bind.clone(),
            ssl,
            Arc::new(restful_ctx),
            self.payload_limit_mib.unwrap_or(Self::DEFAULT_PAYLOAD_LIMIT_MIB) as usize,
        );

        if let Some(keep_alive_secs) = self.keep_alive_secs {
            srv.set_keep_alive_secs(keep_alive_secs);
        }

        if let Some(workers) = self.workers {
            srv.set_workers(workers);
        }

        Ok(srv)
    }

    /// Ensures the protected ADMIN role and the bootstrap admin account
    /// exist and are linked. The admin's password comes from configuration;
    /// an existing account is left untouched.
    fn bootstrap_admin(&self, db: &Database) -> Result<()> {
        let now = time::current_timestamp();
        db.with_transaction(|tx| {
            let role = match tx.get_role_by_code(ADMIN_ROLE_CODE)? {
                Some(role) => role,
                None => {
                    let role = portal_misc::api::role::Role {
                        id: Uuid::new_v4().to_string(),
                        name: String::from("Administrators"),
                        code: ADMIN_ROLE_CODE.to_string(),
                        is_active: true,
                        create_time: now,
                        update_time: now,
                    };
                    tx.create_role(&role)?;
                    info!("Created bootstrap ADMIN role");
                    role
                }
            };

            let user = match tx.get_user_by_name(ADMIN_USER)? {
                Some(user) => user,
                None => {
                    let salt = code::generate_salt(self.salt_length);
                    let user = UserRecord {
                        id: Uuid::new_v4().to_string(),
                        name: ADMIN_USER.to_string(),
                        email: None,
                        hash: code::sha256(format!("{}{salt}", self.admin_password)),
                        salt,
                        is_active: true,
                        create_time: now,
                        update_time: now,
                    };
                    tx.create_user(&user)?;
                    info!("Created bootstrap admin user");
                    user
                }
            };

            tx.create_user_role(&user.id, &role.id)?;
            Ok(())
        })
    }

    fn read_jwt_keys(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let public_key_path = self.pki_dir.join("token_public.pem");
        let private_key_path = self.pki_dir.join("token_private.pem");
        if public_key_path.exists() && private_key_path.exists() {
            let public_key = fs::read(&public_key_path).context("read token public key")?;
            let private_key = fs::read(&private_key_path).context("read token private key")?;
            return Ok((public_key, private_key));
        }

        info!("Token keys for jwt not exists, try to generate new ones");
        let (public_key, private_key) =
            rsa::generate_rsa_keys().context("generate keys for token")?;

        fs::write(&public_key_path, &public_key).context("write token public key")?;
        fs::write(&private_key_path, &private_key).context("write token private key")?;

        Ok((public_key, private_key))
    }

    fn build_ssl(&self) -> Result<SslAcceptorBuilder> {
        let key_path = self.pki_dir.join("key.pem");
        if !key_path.exists() {
            bail!("ssl key file not exists: {:?}", key_path);
        }

        let cert_path = self.pki_dir.join("cert.pem");
        if !cert_path.exists() {
            bail!("ssl cert file not exists: {:?}", cert_path);
        }

        let mut builder =
            SslAcceptor::mozilla_intermediate(SslMethod::tls()).context("init ssl acceptor")?;

        builder
            .set_private_key_file(&key_path, openssl::ssl::SslFiletype::PEM)
            .context("load ssl key file")?;
        builder
            .set_certificate_chain_file(&cert_path)
            .context("load ssl cert file")?;

        Ok(builder)
    }

    const DEFAULT_PAYLOAD_LIMIT_MIB: u64 = 10;

    fn default_bind() -> String {
        String::from("127.0.0.1:13650")
    }

    fn default_admin_password() -> String {
        String::from("admin_password123")
    }

    fn default_salt_length() -> usize {
        24
    }

    fn default_access_token_expiry_secs() -> u64 {
        60 * 60 // 1 hour
    }

    fn default_refresh_token_expiry_secs() -> u64 {
        60 * 60 * 24 * 7 // 7 days
    }

    fn default_session_recycle_hours() -> u64 {
        24
    }
}
