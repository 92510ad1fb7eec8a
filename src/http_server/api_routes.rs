//! Management routes
//!
//! Static routes for listing macros, fetching one descriptor, and
//! executing by name with a JSON body. These complement the per-macro
//! dynamic routes and always exist regardless of what was discovered.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::catalog::MacroDescriptor;
use crate::executor::ExecutionResult;

use super::dynamic_routes::execute_macro;
use super::errors::ApiError;
use super::state::AppState;

/// Body for the named execute route
#[derive(Debug, Deserialize)]
pub struct MacroExecutionRequest {
    #[serde(default)]
    pub parameters: HashMap<String, JsonValue>,
}

/// Build the management router
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/macros", get(list_macros_handler))
        .route("/macros/{name}", get(get_macro_handler))
        .route("/macros/{name}/execute", post(execute_macro_handler))
        .with_state(state)
}

async fn list_macros_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MacroDescriptor>>, ApiError> {
    let state = Arc::clone(&state);
    let macros = tokio::task::spawn_blocking(move || state.catalog.discover())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(macros.iter().map(|m| (**m).clone()).collect()))
}

async fn get_macro_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<MacroDescriptor>, ApiError> {
    let state = Arc::clone(&state);
    let descriptor = tokio::task::spawn_blocking(move || state.catalog.get_by_name(&name))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json((*descriptor).clone()))
}

async fn execute_macro_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(request): Json<MacroExecutionRequest>,
) -> Result<Json<ExecutionResult>, ApiError> {
    execute_macro(state, name, request.parameters).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::connection::ConnectionManager;

    #[test]
    fn test_router_builds() {
        let manager = Arc::new(ConnectionManager::new(":memory:", false).unwrap());
        let state = Arc::new(AppState::new(Settings::default(), manager));
        let _router = api_routes(state);
    }

    #[test]
    fn test_request_body_defaults_to_empty_parameters() {
        let request: MacroExecutionRequest = serde_json::from_str("{}").unwrap();
        assert!(request.parameters.is_empty());

        let request: MacroExecutionRequest =
            serde_json::from_str(r#"{"parameters": {"x": 1}}"#).unwrap();
        assert_eq!(request.parameters.len(), 1);
    }
}
