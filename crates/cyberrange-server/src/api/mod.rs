//! API endpoints module

pub mod admin;
pub mod auth;
pub mod scenarios;
pub mod sessions;

pub use admin::{overview, Overview};
pub use auth::{login_handler, logout_handler, me_handler, register_handler, LoginResponse};
pub use scenarios::{define_scenario, launch_scenario, list_scenarios, LaunchResponse};
pub use sessions::{dashboard, end_session, view_session, EndResponse};
