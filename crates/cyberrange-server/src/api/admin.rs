//! Read-only overview across all users

use crate::{
    auth::{self, UserInfo},
    error::WebResult,
    state::AppState,
};
use axum::{extract::State, Json};
use cyberrange::{Scenario, SessionSummary};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Serialize)]
pub struct OverviewSession {
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Overview {
    pub users: Vec<UserInfo>,
    pub scenarios: Vec<Scenario>,
    pub active_sessions: Vec<OverviewSession>,
    pub backend_reachable: bool,
}

/// Instructor or admin
pub async fn overview(State(state): State<AppState>) -> WebResult<Json<Overview>> {
    let users = auth::list_users(&state.pool).await?;
    let scenarios = state.orchestrator.list_scenarios().await?;
    let sessions = state.orchestrator.active_sessions().await?;

    let backend_reachable = match state.orchestrator.backend_status().await {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!("Backend probe failed: {}", err);
            false
        }
    };

    let names: HashMap<&str, &str> = users
        .iter()
        .map(|u| (u.id.as_str(), u.username.as_str()))
        .collect();
    let active_sessions = sessions
        .into_iter()
        .map(|summary| OverviewSession {
            username: names
                .get(summary.session.user_id.as_str())
                .map(|name| name.to_string()),
            summary,
        })
        .collect();

    Ok(Json(Overview {
        users: users.into_iter().map(UserInfo::from).collect(),
        scenarios,
        active_sessions,
        backend_reachable,
    }))
}
