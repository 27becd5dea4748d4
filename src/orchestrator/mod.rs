//! Lifecycle orchestrator
//!
//! Drives sessions through launch (duplicate -> register -> start) and
//! teardown (stop -> delete -> mark ended), coordinating the lab backend with
//! the session registry. It is the only component that changes a session's
//! status.
//!
//! Failure policy:
//! - Nothing is written to the registry before the template project has been
//!   duplicated, so a failed duplicate leaves no record behind.
//! - A failed start does not undo the launch. The project exists, so the
//!   session is recorded active and the caller gets a degraded-launch report.
//! - Teardown attempts stop and delete regardless of each other's outcome and
//!   then marks the session ended unconditionally. A backend that cannot be
//!   cleaned up must not lock the user out of relaunching; the orphaned
//!   project is logged and recorded on the session.
//! - No automatic retries. Callers resubmit.

mod locks;

use crate::backend::{BackendError, BackendResult, LabBackend, NodeInfo, ProjectInfo};
use crate::error::{RangeError, Result};
use crate::lifecycle::{PhaseTracker, SessionPhase};
use crate::store::{
    CatalogStore, Difficulty, NewScenario, NewSession, Scenario, Session, SessionRegistry,
    SessionSummary, Store,
};
use chrono::{DateTime, Utc};
use locks::PairLocks;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Who is asking. `username` only feeds backend project names.
#[derive(Debug, Clone)]
pub struct Requester {
    pub user_id: String,
    pub username: String,
}

impl Requester {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }
}

/// Result of the start request issued after registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    /// The session exists but its nodes may not be running; start can be retried
    Degraded { reason: String },
}

/// Successful launch
#[derive(Debug, Clone, Serialize)]
pub struct LaunchReport {
    pub session: Session,
    pub scenario: Scenario,
    pub start: StartOutcome,
}

impl LaunchReport {
    pub fn is_degraded(&self) -> bool {
        matches!(self.start, StartOutcome::Degraded { .. })
    }
}

/// Backend side of a teardown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CleanupOutcome {
    Clean,
    /// Nothing was attempted because the session had already ended
    Skipped,
    Partial {
        stop_error: Option<String>,
        delete_error: Option<String>,
    },
}

impl CleanupOutcome {
    fn from_results(stop: BackendResult<()>, delete: BackendResult<()>) -> Self {
        match (stop, delete) {
            (Ok(()), Ok(())) => CleanupOutcome::Clean,
            (stop, delete) => CleanupOutcome::Partial {
                stop_error: stop.err().map(|e| e.to_string()),
                delete_error: delete.err().map(|e| e.to_string()),
            },
        }
    }

    /// Text stored on the session when cleanup did not fully succeed
    fn failure_note(&self) -> Option<String> {
        match self {
            CleanupOutcome::Partial {
                stop_error,
                delete_error,
            } => {
                let parts: Vec<String> = [
                    stop_error.as_ref().map(|e| format!("stop: {}", e)),
                    delete_error.as_ref().map(|e| format!("delete: {}", e)),
                ]
                .into_iter()
                .flatten()
                .collect();
                Some(parts.join("; "))
            }
            _ => None,
        }
    }
}

/// Completed teardown. The session is `ended` in every case.
#[derive(Debug, Clone, Serialize)]
pub struct TeardownReport {
    pub session: Session,
    pub already_ended: bool,
    pub cleanup: CleanupOutcome,
}

impl TeardownReport {
    /// `PartialFailure` when the registry flipped but the backend was not cleaned up
    pub fn partial_failure(&self) -> Option<RangeError> {
        self.cleanup
            .failure_note()
            .map(|detail| RangeError::PartialFailure {
                session_id: self.session.id,
                detail,
            })
    }
}

/// Node listing that keeps "call failed" distinct from "no nodes"
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NodeListing {
    Available { nodes: Vec<NodeInfo> },
    Unavailable { reason: String },
}

/// Everything a user needs to work in a running lab
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session: Session,
    pub scenario_name: String,
    pub scenario_description: String,
    pub difficulty: Difficulty,
    pub nodes: NodeListing,
    pub web_ui_url: Option<String>,
}

/// Instructor input for a new scenario
#[derive(Debug, Clone, Deserialize)]
pub struct DefineScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Existing backend project to use as template. When absent an empty
    /// project is created on the backend.
    #[serde(default)]
    pub template_project_id: Option<String>,
}

/// The launch/teardown state machine over catalog, registry and backend
#[derive(Clone)]
pub struct Orchestrator {
    catalog: CatalogStore,
    registry: SessionRegistry,
    backend: Arc<dyn LabBackend>,
    locks: Arc<PairLocks>,
}

impl Orchestrator {
    pub fn new(store: &Store, backend: Arc<dyn LabBackend>) -> Self {
        Self {
            catalog: store.catalog(),
            registry: store.registry(),
            backend,
            locks: Arc::new(PairLocks::default()),
        }
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &Arc<dyn LabBackend> {
        &self.backend
    }

    /// Give `requester` a private running copy of a scenario.
    #[instrument(skip(self, requester), fields(user = %requester.user_id))]
    pub async fn launch(&self, requester: &Requester, scenario_id: i64) -> Result<LaunchReport> {
        let mut tracker = PhaseTracker::new(format!(
            "launch {}/{}",
            requester.user_id, scenario_id
        ));
        let result = self.run_launch(&mut tracker, requester, scenario_id).await;
        if let Err(err) = &result {
            tracker.fail(&err.to_string());
        }
        result
    }

    async fn run_launch(
        &self,
        tracker: &mut PhaseTracker,
        requester: &Requester,
        scenario_id: i64,
    ) -> Result<LaunchReport> {
        let scenario = self.catalog.get(scenario_id).await?;

        // Held until the session row exists, so a concurrent launch of the
        // same pair sees it and never reaches the backend
        let _pair = self.locks.acquire(&requester.user_id, scenario_id).await;

        if let Some(existing) = self
            .registry
            .find_active(&requester.user_id, scenario_id)
            .await?
        {
            info!(
                "User {} already runs scenario {} as session {}",
                requester.user_id, scenario_id, existing.id
            );
            return Err(RangeError::SessionAlreadyActive {
                user_id: requester.user_id.clone(),
                scenario_id,
            });
        }

        tracker.advance(SessionPhase::Duplicating)?;
        let name = project_name(&scenario, &requester.username, Utc::now());
        let project = self
            .backend
            .duplicate_project(&scenario.template_project_id, &name)
            .await
            .map_err(RangeError::ProvisioningFailed)?;

        let session = match self
            .registry
            .create(NewSession {
                user_id: requester.user_id.clone(),
                scenario_id,
                project_id: project.project_id.clone(),
            })
            .await
        {
            Ok(session) => session,
            Err(err) => {
                // The copy exists but nothing references it
                self.discard_project(&project).await;
                return Err(err);
            }
        };

        tracker.advance(SessionPhase::Starting)?;
        let start = match self.backend.start_project(&session.project_id).await {
            Ok(()) => StartOutcome::Started,
            Err(err) => {
                warn!(
                    "Session {} registered but project {} did not start: {}",
                    session.id, session.project_id, err
                );
                StartOutcome::Degraded {
                    reason: err.to_string(),
                }
            }
        };
        tracker.advance(SessionPhase::Active)?;

        info!(
            "Launched session {} of '{}' for {} (project {})",
            session.id, scenario.name, requester.user_id, session.project_id
        );
        Ok(LaunchReport {
            session,
            scenario,
            start,
        })
    }

    async fn discard_project(&self, project: &ProjectInfo) {
        if let Err(err) = self.backend.delete_project(&project.project_id).await {
            warn!(
                "Orphaned backend project {} ({}) could not be deleted: {}",
                project.project_id, project.name, err
            );
        }
    }

    /// Stop and delete a session's project, then mark it ended.
    ///
    /// Ending an already-ended session is a no-op success.
    #[instrument(skip(self))]
    pub async fn end_session(&self, owner_id: &str, session_id: i64) -> Result<TeardownReport> {
        let session = self.owned_session(owner_id, session_id).await?;
        let _pair = self.locks.acquire(&session.user_id, session.scenario_id).await;

        // Re-read under the lock; a concurrent teardown may have finished
        let session = self.registry.get(session_id, owner_id).await?;
        if !session.is_active() {
            info!("Session {} already ended", session_id);
            return Ok(TeardownReport {
                session,
                already_ended: true,
                cleanup: CleanupOutcome::Skipped,
            });
        }

        let mut tracker =
            PhaseTracker::resume(format!("session {}", session_id), SessionPhase::Active);

        tracker.advance(SessionPhase::Stopping)?;
        let stop = tolerate_missing(self.backend.stop_project(&session.project_id).await);
        if let Err(err) = &stop {
            warn!("Stopping project {} failed: {}", session.project_id, err);
        }

        tracker.advance(SessionPhase::Deleting)?;
        let delete = tolerate_missing(self.backend.delete_project(&session.project_id).await);
        if let Err(err) = &delete {
            warn!(
                "Deleting project {} failed, it is now orphaned: {}",
                session.project_id, err
            );
        }

        let cleanup = CleanupOutcome::from_results(stop, delete);
        let note = cleanup.failure_note();
        let session = match self.registry.mark_ended(session_id, note.as_deref()).await {
            Ok(session) => session,
            Err(err) => {
                tracker.fail(&err.to_string());
                return Err(err);
            }
        };
        tracker.advance(SessionPhase::Ended)?;

        Ok(TeardownReport {
            session,
            already_ended: false,
            cleanup,
        })
    }

    /// Session record plus a live node listing
    #[instrument(skip(self))]
    pub async fn session_view(&self, owner_id: &str, session_id: i64) -> Result<SessionView> {
        let session = self.owned_session(owner_id, session_id).await?;
        let scenario = self.catalog.get(session.scenario_id).await?;

        let nodes = if session.is_active() {
            match self.backend.list_nodes(&session.project_id).await {
                Ok(nodes) => NodeListing::Available { nodes },
                Err(err) => NodeListing::Unavailable {
                    reason: err.to_string(),
                },
            }
        } else {
            NodeListing::Unavailable {
                reason: "session has ended".to_string(),
            }
        };

        Ok(SessionView {
            web_ui_url: session
                .is_active()
                .then(|| self.backend.web_ui_url(&session.project_id))
                .flatten(),
            session,
            scenario_name: scenario.name,
            scenario_description: scenario.description,
            difficulty: scenario.difficulty,
            nodes,
        })
    }

    /// Ownership-scoped lookup; cross-owner attempts are audited but answered
    /// exactly like a missing session
    async fn owned_session(&self, owner_id: &str, session_id: i64) -> Result<Session> {
        match self.registry.get(session_id, owner_id).await {
            Err(RangeError::SessionNotFound(id)) => {
                if let Some(actual_owner) = self.registry.owner_of(id).await? {
                    warn!(
                        target: "audit",
                        requester = owner_id,
                        owner = %actual_owner,
                        session = id,
                        "refused access to another user's session"
                    );
                }
                Err(RangeError::SessionNotFound(id))
            }
            other => other,
        }
    }

    /// Add a scenario to the catalog, creating its template project when needed
    #[instrument(skip(self, definition), fields(name = %definition.name))]
    pub async fn define_scenario(
        &self,
        instructor_id: &str,
        definition: DefineScenario,
    ) -> Result<Scenario> {
        if definition.name.trim().is_empty() {
            return Err(RangeError::InvalidInput(
                "Scenario name is required".to_string(),
            ));
        }

        let template_project_id = match definition.template_project_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                let name = format!("cyberrange_{}", slug(&definition.name));
                let project = self
                    .backend
                    .create_project(&name)
                    .await
                    .map_err(RangeError::ProvisioningFailed)?;
                info!("Created template project {} ({})", project.project_id, name);
                project.project_id
            }
        };

        self.catalog
            .create(NewScenario {
                name: definition.name,
                description: definition.description,
                difficulty: definition.difficulty,
                template_project_id,
                created_by: instructor_id.to_string(),
            })
            .await
    }

    pub async fn list_scenarios(&self) -> Result<Vec<Scenario>> {
        self.catalog.list().await
    }

    /// A user's active sessions
    pub async fn dashboard(&self, user_id: &str) -> Result<Vec<SessionSummary>> {
        self.registry.list_active_for_user(user_id).await
    }

    /// Every active session, unscoped and read-only
    pub async fn active_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.registry.list_active().await
    }

    /// Point-in-time reachability probe
    pub async fn backend_status(&self) -> std::result::Result<usize, BackendError> {
        self.backend.list_projects().await.map(|projects| projects.len())
    }
}

/// A project that is already gone counts as stopped and deleted
fn tolerate_missing(result: BackendResult<()>) -> BackendResult<()> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        other => other,
    }
}

/// Backend project name for a session copy, unique per (scenario, user, instant)
pub fn project_name(scenario: &Scenario, username: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}_{}",
        slug(&scenario.name),
        scenario.id,
        slug(username),
        at.format("%Y%m%d_%H%M%S_%3f")
    )
}

fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let out = out.trim_end_matches('-').to_string();
    if out.is_empty() {
        "lab".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scenario(name: &str) -> Scenario {
        Scenario {
            id: 7,
            name: name.to_string(),
            description: String::new(),
            difficulty: Difficulty::Beginner,
            template_project_id: "tpl".to_string(),
            created_by: "instructor-1".to_string(),
            created_at: 0,
        }
    }

    #[test]
    fn test_project_name_shape() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let name = project_name(&scenario("Intro Firewall Lab"), "Alice.B", at);
        assert_eq!(name, "intro-firewall-lab_7_alice-b_20250314_092653_000");
    }

    #[test]
    fn test_project_names_differ_across_instants() {
        let s = scenario("lab");
        let t1 = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let t2 = Utc.timestamp_millis_opt(1_700_000_000_001).unwrap();
        assert_ne!(project_name(&s, "u", t1), project_name(&s, "u", t2));
    }

    #[test]
    fn test_slug_edge_cases() {
        assert_eq!(slug("  --Wi-Fi  Attack!! "), "wi-fi-attack");
        assert_eq!(slug("Ünïcode"), "n-code");
        assert_eq!(slug("***"), "lab");
    }

    #[test]
    fn test_cleanup_note() {
        let clean = CleanupOutcome::from_results(Ok(()), Ok(()));
        assert_eq!(clean, CleanupOutcome::Clean);
        assert!(clean.failure_note().is_none());

        let partial = CleanupOutcome::from_results(
            Err(BackendError::Unavailable("timeout".into())),
            Ok(()),
        );
        assert_eq!(
            partial.failure_note().as_deref(),
            Some("stop: Lab backend unavailable: timeout")
        );
    }

    #[test]
    fn test_missing_project_tolerated() {
        let gone = Err(BackendError::Rejected {
            status: 404,
            message: "no such project".into(),
        });
        assert!(tolerate_missing(gone).is_ok());

        let refused = Err(BackendError::Rejected {
            status: 409,
            message: "locked".into(),
        });
        assert!(tolerate_missing(refused).is_err());
    }
}
