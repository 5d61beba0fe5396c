//! ==============================================================================
//! server.rs - web server
//! ==============================================================================
//!
//! routes:
//!     GET /                      dashboard page (render.rs)
//!     GET /api/get-newest-temp   newest telemetry row as json (store.rs)
//!     GET /api/dashboard         current monitor snapshot as json
//!
//! ==============================================================================

use crate::monitor::{DashboardSnapshot, Monitor};
use crate::render;
use crate::store::TelemetryStore;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const FETCH_ERROR_MESSAGE: &str = "An error occurred while fetching the newest temperature data";

// ==============================================================================
// shared state
// ==============================================================================
// the store answers the telemetry endpoint; the monitor's snapshot
// backs the dashboard page. both are cheap to clone.

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TelemetryStore>,
    pub monitor: Monitor,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/get-newest-temp", get(newest_temp_handler))
        .route("/api/dashboard", get(snapshot_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(bind: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    tracing::info!("[STARTUP] ✓ Dashboard live at http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// newest row of the telemetry table, `null` when the table is empty
async fn newest_temp_handler(State(state): State<AppState>) -> Response {
    match state.store.newest_row().await {
        Ok(row) => (StatusCode::OK, Json(row)).into_response(),
        Err(e) => {
            tracing::error!("[API] newest reading query failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": FETCH_ERROR_MESSAGE })),
            )
                .into_response()
        }
    }
}

async fn dashboard_handler(State(state): State<AppState>) -> Html<String> {
    let snapshot = state.monitor.snapshot().await;
    let settings = state.monitor.settings();
    Html(render::dashboard_page(&snapshot, &settings.features, settings.interval))
}

async fn snapshot_handler(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.monitor.snapshot().await)
}
