//! Session registry: the durable record of who runs which lab
//!
//! This is the single source of truth for "is this session active". Only
//! the orchestrator writes to it, and only at two checkpoints: after a
//! successful duplicate (`create`) and at teardown (`mark_ended`).

use super::{decode_error, now};
use crate::error::{RangeError, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

/// Persisted session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "ended" => Ok(SessionStatus::Ended),
            _ => Err(format!("Invalid session status: {}", s)),
        }
    }
}

/// One user's running copy of a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub user_id: String,
    pub scenario_id: i64,
    /// The duplicated backend project; set once at creation
    pub project_id: String,
    pub status: SessionStatus,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    /// Backend cleanup failure recorded at teardown, if any
    pub cleanup_error: Option<String>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Insert payload for [`SessionRegistry::create`]
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: String,
    pub scenario_id: i64,
    pub project_id: String,
}

/// Session joined with its scenario name, for dashboards and admin listing
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    #[serde(flatten)]
    pub session: Session,
    pub scenario_name: String,
}

fn row_to_session(row: &SqliteRow) -> Result<Session> {
    let status: String = row.try_get("status")?;
    Ok(Session {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        scenario_id: row.try_get("scenario_id")?,
        project_id: row.try_get("project_id")?,
        status: status.parse().map_err(|e| decode_error("status", e))?,
        started_at: row.try_get("started_at")?,
        ended_at: row.try_get("ended_at")?,
        cleanup_error: row.try_get("cleanup_error")?,
    })
}

const SESSION_COLUMNS: &str =
    "id, user_id, scenario_id, project_id, status, started_at, ended_at, cleanup_error";

/// Session repository
#[derive(Clone)]
pub struct SessionRegistry {
    pool: SqlitePool,
}

impl SessionRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The active session for (user, scenario), if any
    pub async fn find_active(&self, user_id: &str, scenario_id: i64) -> Result<Option<Session>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM sessions WHERE user_id = ? AND scenario_id = ? AND status = 'active'",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .bind(scenario_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_session).transpose()
    }

    /// Record a new active session.
    ///
    /// Check and insert are one statement, so two writers cannot both pass
    /// the check. Returns `SessionAlreadyActive` when the pair is taken.
    pub async fn create(&self, new: NewSession) -> Result<Session> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO sessions (user_id, scenario_id, project_id, status, started_at)
            SELECT ?, ?, ?, 'active', ?
            WHERE NOT EXISTS (
                SELECT 1 FROM sessions
                WHERE user_id = ? AND scenario_id = ? AND status = 'active'
            )
            RETURNING {}
            "#,
            SESSION_COLUMNS
        ))
        .bind(&new.user_id)
        .bind(new.scenario_id)
        .bind(&new.project_id)
        .bind(now())
        .bind(&new.user_id)
        .bind(new.scenario_id)
        .fetch_optional(&self.pool)
        .await;

        let conflict = || RangeError::SessionAlreadyActive {
            user_id: new.user_id.clone(),
            scenario_id: new.scenario_id,
        };

        match result {
            Ok(Some(row)) => {
                let session = row_to_session(&row)?;
                tracing::debug!(
                    "Registered session {} (project {})",
                    session.id,
                    session.project_id
                );
                Ok(session)
            }
            Ok(None) => Err(conflict()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(conflict()),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(RangeError::ScenarioNotFound(new.scenario_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Flip a session to `ended`.
    ///
    /// Idempotent: an already-ended session is returned unchanged, including
    /// its original end timestamp and cleanup note.
    pub async fn mark_ended(&self, session_id: i64, cleanup_error: Option<&str>) -> Result<Session> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE sessions
            SET status = 'ended', ended_at = ?, cleanup_error = ?
            WHERE id = ? AND status = 'active'
            RETURNING {}
            "#,
            SESSION_COLUMNS
        ))
        .bind(now())
        .bind(cleanup_error)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return row_to_session(&row);
        }

        let row = sqlx::query(&format!(
            "SELECT {} FROM sessions WHERE id = ?",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_session(&row),
            None => Err(RangeError::SessionNotFound(session_id)),
        }
    }

    /// Ownership-scoped lookup. A session of another user is reported as
    /// missing.
    pub async fn get(&self, session_id: i64, owner_id: &str) -> Result<Session> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM sessions WHERE id = ? AND user_id = ?",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_session(&row),
            None => Err(RangeError::SessionNotFound(session_id)),
        }
    }

    /// Owner of a session regardless of who asks. Audit use only.
    pub async fn owner_of(&self, session_id: i64) -> Result<Option<String>> {
        let owner: Option<String> = sqlx::query_scalar("SELECT user_id FROM sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner)
    }

    /// A user's active sessions, newest first
    pub async fn list_active_for_user(&self, user_id: &str) -> Result<Vec<SessionSummary>> {
        self.list_summaries(Some(user_id)).await
    }

    /// Every active session (admin listing, read-only)
    pub async fn list_active(&self) -> Result<Vec<SessionSummary>> {
        self.list_summaries(None).await
    }

    async fn list_summaries(&self, user_id: Option<&str>) -> Result<Vec<SessionSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.user_id, s.scenario_id, s.project_id, s.status,
                   s.started_at, s.ended_at, s.cleanup_error,
                   c.name AS scenario_name
            FROM sessions s
            JOIN scenarios c ON c.id = s.scenario_id
            WHERE s.status = 'active' AND (? IS NULL OR s.user_id = ?)
            ORDER BY s.started_at DESC, s.id DESC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(SessionSummary {
                    session: row_to_session(row)?,
                    scenario_name: row.try_get("scenario_name")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [SessionStatus::Active, SessionStatus::Ended] {
            assert_eq!(status.as_str().parse::<SessionStatus>(), Ok(status));
        }
        assert!("running".parse::<SessionStatus>().is_err());
    }
}
