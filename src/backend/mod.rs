//! Network-emulation backend abstraction
//!
//! The lab backend is a GNS3-compatible server exposing projects made of
//! virtual nodes. The core consumes it through the [`LabBackend`] trait so the
//! orchestrator can be driven against the real REST client ([`Gns3Client`]) or
//! an in-process fake in tests.
//!
//! Every operation issues exactly one backend request, is bounded by a
//! timeout, and returns either a descriptor or a [`BackendError`]. Transport
//! errors are never propagated raw, and no retries happen at this layer.
//!
//! # Example
//!
//! ```no_run
//! use cyberrange::backend::{Gns3Client, LabBackend};
//! use cyberrange::config::BackendConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Gns3Client::new(&BackendConfig::default())?;
//! let copy = client.duplicate_project("b4c1…", "intro_lab_alice_20250101_120000").await?;
//! client.start_project(&copy.project_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod gns3;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod types;

pub use error::{BackendError, BackendResult};
pub use gns3::Gns3Client;
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryBackend;
pub use types::{NodeInfo, ProjectInfo};

use async_trait::async_trait;

/// Project/node contract of the emulation server.
#[async_trait]
pub trait LabBackend: Send + Sync {
    /// List every project known to the server.
    async fn list_projects(&self) -> BackendResult<Vec<ProjectInfo>>;

    /// Create an empty project.
    async fn create_project(&self, name: &str) -> BackendResult<ProjectInfo>;

    /// Copy `source_id` (topology included) into a new project called `new_name`.
    async fn duplicate_project(&self, source_id: &str, new_name: &str)
        -> BackendResult<ProjectInfo>;

    /// Point-in-time node listing of a project.
    async fn list_nodes(&self, project_id: &str) -> BackendResult<Vec<NodeInfo>>;

    /// Start every node of a project.
    async fn start_project(&self, project_id: &str) -> BackendResult<()>;

    /// Stop every node of a project.
    async fn stop_project(&self, project_id: &str) -> BackendResult<()>;

    /// Delete a project. Must be safe to call for a project that may already be gone.
    async fn delete_project(&self, project_id: &str) -> BackendResult<()>;

    /// Browser link into the server's web UI for a project, when it has one.
    fn web_ui_url(&self, _project_id: &str) -> Option<String> {
        None
    }
}
