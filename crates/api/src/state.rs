use std::sync::Arc;
use std::time::Duration;

use keystone_core::error::ConfigError;
use keystone_core::snowflake::IdGenerator;
use keystone_db::store::SessionStore;

use crate::auth::jwt::TokenSigner;
use crate::auth::session::{SessionManager, SessionPolicy};
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything sits behind an `Arc` or is a pool handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: keystone_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Access-token signer built from `JWT_SECRET_KEY`.
    pub signer: Arc<TokenSigner>,
    /// Process-wide snowflake id source.
    pub ids: Arc<IdGenerator>,
    /// Session issuance and refresh.
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    /// Wire up the signer, id generator, and session manager from `config`.
    pub fn new(
        pool: keystone_db::DbPool,
        config: ServerConfig,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, ConfigError> {
        let signer = Arc::new(TokenSigner::new(&config.jwt.secret)?);
        let ids = Arc::new(IdGenerator::with_default_epoch(config.machine_id)?);

        let policy = SessionPolicy {
            refresh_token_expiry_days: config.jwt.refresh_token_expiry_days,
            access_token_expiry_mins: config.jwt.access_token_expiry_mins,
            store_timeout: Duration::from_secs(config.store_timeout_secs),
        };
        let sessions = Arc::new(SessionManager::new(
            store,
            Arc::clone(&ids),
            Arc::clone(&signer),
            policy,
        ));

        Ok(Self {
            pool,
            config: Arc::new(config),
            signer,
            ids,
            sessions,
        })
    }
}
