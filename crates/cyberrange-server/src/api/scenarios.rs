//! Scenario catalog endpoints and launch

use crate::{auth::Claims, error::WebResult, state::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use cyberrange::{DefineScenario, Scenario, SessionView, StartOutcome};
use serde::Serialize;

/// A launched session, ready to use
#[derive(Debug, Serialize)]
pub struct LaunchResponse {
    pub start: StartOutcome,
    pub view: SessionView,
}

pub async fn list_scenarios(State(state): State<AppState>) -> WebResult<Json<Vec<Scenario>>> {
    Ok(Json(state.orchestrator.list_scenarios().await?))
}

/// Instructor only
pub async fn define_scenario(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(definition): Json<DefineScenario>,
) -> WebResult<(StatusCode, Json<Scenario>)> {
    let scenario = state
        .orchestrator
        .define_scenario(&claims.sub, definition)
        .await?;
    tracing::info!(
        "Scenario {} '{}' defined by {}",
        scenario.id,
        scenario.name,
        claims.username
    );
    Ok((StatusCode::CREATED, Json(scenario)))
}

pub async fn launch_scenario(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(scenario_id): Path<i64>,
) -> WebResult<(StatusCode, Json<LaunchResponse>)> {
    let report = state
        .orchestrator
        .launch(&claims.requester(), scenario_id)
        .await?;
    let view = state
        .orchestrator
        .session_view(&claims.sub, report.session.id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(LaunchResponse {
            start: report.start,
            view,
        }),
    ))
}
