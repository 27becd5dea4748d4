//! A user's own sessions: dashboard, view and end

use crate::{auth::Claims, error::WebResult, state::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use cyberrange::{SessionSummary, SessionView, TeardownReport};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct EndResponse {
    #[serde(flatten)]
    pub report: TeardownReport,
    /// Present when the session ended but backend cleanup did not succeed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Active sessions of the caller
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> WebResult<Json<Vec<SessionSummary>>> {
    Ok(Json(state.orchestrator.dashboard(&claims.sub).await?))
}

pub async fn view_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
) -> WebResult<Json<SessionView>> {
    Ok(Json(
        state
            .orchestrator
            .session_view(&claims.sub, session_id)
            .await?,
    ))
}

/// 200 on clean or repeated teardown, 207 when the backend kept the project
pub async fn end_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
) -> WebResult<(StatusCode, Json<EndResponse>)> {
    let report = state
        .orchestrator
        .end_session(&claims.sub, session_id)
        .await?;

    let error = report.partial_failure().map(|err| err.user_message());
    let status = if error.is_some() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::OK
    };
    Ok((status, Json(EndResponse { report, error })))
}
