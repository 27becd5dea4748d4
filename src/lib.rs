/*!
 * Cyber range core: per-user network labs on a GNS3-compatible backend
 *
 * A scenario is a lab topology template held as a backend project. Launching
 * it for a user duplicates that project, records the copy as the user's
 * session and starts its nodes; ending the session stops and deletes the
 * copy. The [`Orchestrator`] guarantees at most one active session per
 * (user, scenario) and keeps the registry consistent with the backend when
 * individual backend calls fail.
 *
 * ```no_run
 * use cyberrange::{config::RangeConfig, Gns3Client, Orchestrator, Requester, Store};
 * use std::sync::Arc;
 *
 * # async fn example() -> cyberrange::Result<()> {
 * let config = RangeConfig::load(None)?;
 * let store = Store::open(&config.database).await?;
 * let backend = Arc::new(Gns3Client::new(&config.backend)?);
 * let orchestrator = Orchestrator::new(&store, backend);
 *
 * let alice = Requester::new("4f1c…", "alice");
 * let launch = orchestrator.launch(&alice, 1).await?;
 * orchestrator.end_session(&alice.user_id, launch.session.id).await?;
 * # Ok(())
 * # }
 * ```
 */

pub mod backend;
pub mod cli_style;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod orchestrator;
pub mod store;

pub use backend::{BackendError, Gns3Client, LabBackend, NodeInfo, ProjectInfo};
#[cfg(any(test, feature = "testing"))]
pub use backend::MemoryBackend;
pub use error::{ErrorKind, RangeError, Result};
pub use lifecycle::{PhaseTracker, SessionPhase};
pub use orchestrator::{
    CleanupOutcome, DefineScenario, LaunchReport, NodeListing, Orchestrator, Requester,
    SessionView, StartOutcome, TeardownReport,
};
pub use store::{
    CatalogStore, Difficulty, NewScenario, Scenario, Session, SessionRegistry, SessionStatus,
    SessionSummary, Store,
};
