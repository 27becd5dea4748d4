//! Axum router and server loop

use crate::{
    api,
    auth::{require_auth, require_role, Role},
    state::AppState,
};
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use cyberrange::config::RangeConfig;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// All routes with their auth layers; no network binding
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/auth/register", post(api::register_handler))
        .route("/api/auth/login", post(api::login_handler))
        .route("/api/auth/logout", post(api::logout_handler))
        .route(
            "/api/health",
            get(|| async {
                Json(serde_json::json!({
                    "status": "ok",
                    "service": "cyberrange-server",
                    "version": env!("CARGO_PKG_VERSION"),
                }))
            }),
        );

    let student = Router::new()
        .route("/api/auth/me", get(api::me_handler))
        .route("/api/scenarios", get(api::list_scenarios))
        .route("/api/scenarios/:id/launch", post(api::launch_scenario))
        .route("/api/sessions", get(api::dashboard))
        .route("/api/sessions/:id", get(api::view_session))
        .route("/api/sessions/:id/end", post(api::end_session));

    // GET /api/scenarios stays open to students; only definition is restricted
    let instructor = Router::new()
        .route("/api/scenarios", post(api::define_scenario))
        .route("/api/admin/overview", get(api::overview))
        .route_layer(middleware::from_fn(require_role(Role::Instructor)));

    let protected = student
        .merge(instructor)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    public
        .merge(protected)
        .fallback(|| async {
            (
                axum::http::StatusCode::NOT_FOUND,
                "Cyber range API - endpoints are under /api/*",
            )
        })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Bind and serve until the process is stopped
pub async fn run_server(config: RangeConfig) -> anyhow::Result<()> {
    tracing::info!("Starting cyber range server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Database: {}", config.database.path.display());
    tracing::info!("Lab backend: {}", config.backend.api_base());

    let state = AppState::new(&config).await?;
    let app = build_router(state).layer(cors_layer());

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("   Health: http://{}/api/health", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
