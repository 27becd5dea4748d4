//! Cyber range web API
//!
//! Accounts, the scenario catalog and per-user lab sessions over HTTP. Every
//! session mutation is delegated to [`cyberrange::Orchestrator`]; this crate
//! only authenticates callers and maps results onto status codes.

pub mod api;
pub mod auth;
pub mod error;
pub mod server;
pub mod state;

pub use error::{WebError, WebResult};
pub use server::build_router;
pub use state::AppState;

use cyberrange::config::RangeConfig;

/// Start the API server with the given configuration
pub async fn start_server(config: RangeConfig) -> anyhow::Result<()> {
    server::run_server(config).await
}
