//! Health, readiness, liveness and metrics routes

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use super::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database_connected: bool,
    pub macro_count: usize,
    pub uptime_seconds: f64,
    pub active_cursors: usize,
    pub version: &'static str,
    pub timestamp: String,
}

/// Detailed health check response, for dashboards and diagnostics
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub database_connected: bool,
    pub macro_count: usize,
    pub uptime_seconds: f64,
    pub version: &'static str,
    pub timestamp: String,
    pub cursor_pool: CursorPoolStatus,
}

/// Cursor-pool portion of the detailed health report
#[derive(Debug, Serialize)]
pub struct CursorPoolStatus {
    pub active_cursors: usize,
    pub database_path: String,
    pub read_only: bool,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: HashMap<&'static str, bool>,
    pub timestamp: String,
}

/// Build root-level health and monitoring routes
pub fn health_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/detailed", get(detailed_health_handler))
        .route("/ready", get(ready_handler))
        .route("/live", get(live_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn probe_database(state: &Arc<AppState>) -> bool {
    let probe = Arc::clone(state);
    tokio::task::spawn_blocking(move || probe.manager.test_connection())
        .await
        .unwrap_or(false)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let connected = probe_database(&state).await;

    Json(HealthResponse {
        status: if connected { "healthy" } else { "unhealthy" },
        database_connected: connected,
        macro_count: state.catalog.len(),
        uptime_seconds: state.uptime_seconds(),
        active_cursors: state.manager.active_count(),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn detailed_health_handler(
    State(state): State<Arc<AppState>>,
) -> Json<DetailedHealthResponse> {
    let connected = probe_database(&state).await;

    Json(DetailedHealthResponse {
        status: if connected { "healthy" } else { "unhealthy" },
        database_connected: connected,
        macro_count: state.catalog.len(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        cursor_pool: CursorPoolStatus {
            active_cursors: state.manager.active_count(),
            database_path: state.manager.db_path().to_string(),
            read_only: state.manager.is_read_only(),
        },
    })
}

async fn ready_handler(State(state): State<Arc<AppState>>) -> Json<ReadinessResponse> {
    let connected = probe_database(&state).await;

    let mut checks = HashMap::new();
    checks.insert("database", connected);
    checks.insert("catalog_primed", !state.catalog.is_empty());

    Json(ReadinessResponse {
        ready: checks.values().all(|ok| *ok),
        checks,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn live_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "alive": true }))
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let connected = probe_database(&state).await;

    let body = render_metrics(
        state.uptime_seconds(),
        connected,
        state.catalog.len(),
        state.manager.active_count(),
    );
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body)
}

/// Prometheus text exposition of the bridge gauges
fn render_metrics(
    uptime_seconds: f64,
    connected: bool,
    macro_count: usize,
    active_cursors: usize,
) -> String {
    let mut out = String::with_capacity(512);
    gauge(
        &mut out,
        "quickquack_uptime_seconds",
        "Application uptime in seconds",
        uptime_seconds,
    );
    gauge(
        &mut out,
        "quickquack_database_connected",
        "Database connection status (1=connected, 0=disconnected)",
        if connected { 1.0 } else { 0.0 },
    );
    gauge(
        &mut out,
        "quickquack_macro_count",
        "Number of discovered macros",
        macro_count as f64,
    );
    gauge(
        &mut out,
        "quickquack_active_cursors",
        "Current active database cursors",
        active_cursors as f64,
    );
    out
}

fn gauge(out: &mut String, name: &str, help: &str, value: f64) {
    out.push_str("# HELP ");
    out.push_str(name);
    out.push(' ');
    out.push_str(help);
    out.push_str("\n# TYPE ");
    out.push_str(name);
    out.push_str(" gauge\n");
    out.push_str(name);
    out.push(' ');
    out.push_str(&value.to_string());
    out.push_str("\n\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::connection::ConnectionManager;

    #[test]
    fn test_health_router_builds() {
        let manager = Arc::new(ConnectionManager::new(":memory:", false).unwrap());
        let state = Arc::new(AppState::new(Settings::default(), manager));
        let _router = health_routes(state);
    }

    #[test]
    fn test_metrics_rendering() {
        let body = render_metrics(12.5, true, 3, 1);
        assert!(body.contains("# HELP quickquack_uptime_seconds Application uptime in seconds"));
        assert!(body.contains("# TYPE quickquack_uptime_seconds gauge"));
        assert!(body.contains("quickquack_uptime_seconds 12.5"));
        assert!(body.contains("quickquack_database_connected 1"));
        assert!(body.contains("quickquack_macro_count 3"));
        assert!(body.contains("quickquack_active_cursors 1"));
    }

    #[test]
    fn test_metrics_report_disconnected_database() {
        let body = render_metrics(0.1, false, 0, 0);
        assert!(body.contains("quickquack_database_connected 0"));
        assert!(body.contains("quickquack_macro_count 0"));
    }
}
