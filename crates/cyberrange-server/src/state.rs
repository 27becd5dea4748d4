//! Shared application state

use crate::auth::{self, AuthKeys};
use cyberrange::{config::RangeConfig, Gns3Client, LabBackend, Orchestrator, Store};
use sqlx::SqlitePool;
use std::sync::Arc;

/// State shared across all handlers; cheap to clone
#[derive(Clone)]
pub struct AppState {
    /// Every session mutation goes through here
    pub orchestrator: Orchestrator,

    /// Same database as the catalog and registry; used for accounts
    pub pool: SqlitePool,

    pub keys: Arc<AuthKeys>,
}

impl AppState {
    /// Open the database and the GNS3 client described by `config`
    pub async fn new(config: &RangeConfig) -> anyhow::Result<Self> {
        let store = Store::open(&config.database).await?;
        let backend = Arc::new(Gns3Client::new(&config.backend)?);
        let keys = AuthKeys::new(
            &config.server.jwt_secret_or_default(),
            config.server.token_ttl_hours,
        );

        let state = Self::with_backend(&store, backend, keys).await?;
        auth::ensure_bootstrap_admin(
            &state.pool,
            config.server.bootstrap_admin_password.as_deref(),
        )
        .await?;

        tracing::info!(
            "Application state initialized (db: {}, backend: {})",
            config.database.path.display(),
            config.backend.url
        );
        Ok(state)
    }

    /// Assemble state over an already opened store and any backend
    pub async fn with_backend(
        store: &Store,
        backend: Arc<dyn LabBackend>,
        keys: AuthKeys,
    ) -> anyhow::Result<Self> {
        let pool = store.pool().clone();
        auth::init_user_db(&pool).await?;

        Ok(Self {
            orchestrator: Orchestrator::new(store, backend),
            pool,
            keys: Arc::new(keys),
        })
    }
}
