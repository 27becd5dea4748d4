//! SQLite persistence for scenarios and sessions
//!
//! One pooled handle is opened at startup and cloned into the
//! [`CatalogStore`] and [`SessionRegistry`]. Each query acquires a
//! connection from the pool for the duration of a single statement or
//! transaction; nothing holds a connection across a backend call.
//!
//! The schema enforces the session invariants independently of the
//! orchestrator:
//! - a partial unique index allows at most one `active` row per
//!   (user, scenario);
//! - a trigger refuses any update of `sessions.project_id`.

pub mod catalog;
pub mod registry;

pub use catalog::{CatalogStore, Difficulty, NewScenario, Scenario};
pub use registry::{NewSession, Session, SessionRegistry, SessionStatus, SessionSummary};

use crate::config::DatabaseConfig;
use crate::error::{RangeError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS scenarios (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        difficulty TEXT NOT NULL DEFAULT 'beginner',
        template_project_id TEXT NOT NULL,
        created_by TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        scenario_id INTEGER NOT NULL REFERENCES scenarios (id),
        project_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'ended')),
        started_at INTEGER NOT NULL,
        ended_at INTEGER,
        cleanup_error TEXT
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_active
        ON sessions (user_id, scenario_id) WHERE status = 'active'
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions (status, user_id)
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS sessions_project_id_immutable
    BEFORE UPDATE OF project_id ON sessions
    WHEN NEW.project_id IS NOT OLD.project_id
    BEGIN
        SELECT RAISE(ABORT, 'sessions.project_id is immutable');
    END
    "#,
];

/// Pooled storage handle
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open or create the database and make sure the schema exists
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let db_url = format!("sqlite://{}", config.path.display());

        // WAL lets readers proceed while a launch or teardown writes
        let options = SqliteConnectOptions::from_str(&db_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        tracing::info!("Range database ready at {}", config.path.display());
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Get the underlying pool (shared with the account tables of the HTTP layer)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn catalog(&self) -> CatalogStore {
        CatalogStore::new(self.pool.clone())
    }

    pub fn registry(&self) -> SessionRegistry {
        SessionRegistry::new(self.pool.clone())
    }
}

/// Decode failure for a column holding an unexpected value
pub(crate) fn decode_error(column: &str, message: String) -> RangeError {
    RangeError::Database(sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.into(),
    })
}

/// Current time as Unix seconds
pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
