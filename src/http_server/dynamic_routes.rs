//! Dynamic route synthesis
//!
//! One externally reachable operation per scalar macro (GET with query
//! parameters) and two per table macro (GET plus a body-carrying POST at
//! the same path). No code is generated at runtime: every route points at
//! the same data-driven handlers, parameterized by the macro name captured
//! at registration time. Generation is additive and idempotent; names
//! already registered are skipped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value as JsonValue;

use crate::catalog::MacroKind;
use crate::errors::MacroResult;
use crate::executor::ExecutionResult;
use crate::observability::Logger;

use super::errors::ApiError;
use super::state::AppState;

/// Builds per-macro routes from the discovered catalog
pub struct RouteSynthesizer {
    state: Arc<AppState>,
    router: Router,
    registered: HashSet<String>,
}

impl RouteSynthesizer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            router: Router::new(),
            registered: HashSet::new(),
        }
    }

    /// Discover the catalog and register routes for every macro not yet
    /// registered. Safe to call repeatedly; the accumulated router is
    /// returned each time.
    pub fn generate_all(&mut self) -> MacroResult<Router> {
        let macros = self.state.catalog.discover()?;

        for descriptor in macros {
            if self.registered.contains(&descriptor.name) {
                continue;
            }

            let path = format!("/{}", descriptor.name);
            let query_handler = {
                let state = Arc::clone(&self.state);
                let name = descriptor.name.clone();
                move |Query(params): Query<HashMap<String, String>>| {
                    let state = Arc::clone(&state);
                    let name = name.clone();
                    async move { execute_from_query(state, name, params).await }
                }
            };

            match descriptor.kind {
                MacroKind::Scalar => {
                    self.router = self.router.clone().route(&path, get(query_handler));
                }
                MacroKind::Table => {
                    let body_handler = {
                        let state = Arc::clone(&self.state);
                        let name = descriptor.name.clone();
                        move |Json(params): Json<HashMap<String, JsonValue>>| {
                            let state = Arc::clone(&state);
                            let name = name.clone();
                            async move { execute_macro(state, name, params).await }
                        }
                    };
                    self.router = self
                        .router
                        .clone()
                        .route(&path, get(query_handler).post(body_handler));
                }
            }

            Logger::info(
                "ROUTE_REGISTERED",
                &[
                    ("macro", descriptor.name.as_str()),
                    ("kind", descriptor.kind.as_str()),
                ],
            );
            self.registered.insert(descriptor.name.clone());
        }

        Ok(self.router.clone())
    }

    /// Sorted names that have routes, for tests and logs
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registered.iter().cloned().collect();
        names.sort();
        names
    }
}

/// Query-string entry point: blank and whitespace-only values are filtered
/// out before coercion ever sees them.
async fn execute_from_query(
    state: Arc<AppState>,
    name: String,
    params: HashMap<String, String>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let raw = filter_query_params(params);
    execute_macro(state, name, raw).await
}

pub(super) fn filter_query_params(
    params: HashMap<String, String>,
) -> HashMap<String, JsonValue> {
    params
        .into_iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| (k, JsonValue::String(v)))
        .collect()
}

/// Shared execution path for every entry point: request limits, blocking
/// driver call on the blocking pool, collaborator-enforced timeout.
pub(super) async fn execute_macro(
    state: Arc<AppState>,
    name: String,
    raw: HashMap<String, JsonValue>,
) -> Result<Json<ExecutionResult>, ApiError> {
    validate_request_limits(&state, &raw)?;

    let timeout_secs = state.settings.query_timeout_secs;
    let executor = Arc::clone(&state.executor);
    let task_name = name.clone();
    let task = tokio::task::spawn_blocking(move || executor.execute(&task_name, &raw));

    match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
        Err(_) => Err(ApiError::Timeout {
            macro_name: name,
            seconds: timeout_secs,
        }),
        Ok(Err(join_error)) => Err(ApiError::Internal(join_error.to_string())),
        Ok(Ok(result)) => result.map(Json).map_err(ApiError::from),
    }
}

/// Request-validation limits applied at the HTTP boundary, before any
/// catalog or coercion work.
fn validate_request_limits(
    state: &AppState,
    raw: &HashMap<String, JsonValue>,
) -> Result<(), ApiError> {
    let settings = &state.settings;
    if raw.len() > settings.max_parameters {
        return Err(ApiError::InvalidRequest(format!(
            "Too many parameters (max {})",
            settings.max_parameters
        )));
    }
    for (key, value) in raw {
        if key.starts_with('_') || key.starts_with('$') {
            return Err(ApiError::InvalidRequest(format!(
                "Parameter name '{}' is not allowed",
                key
            )));
        }
        if let JsonValue::String(s) = value {
            if s.len() > settings.max_value_length {
                return Err(ApiError::InvalidRequest(format!(
                    "Parameter '{}' value too long",
                    key
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::connection::ConnectionManager;
    use serde_json::json;

    fn test_state() -> Arc<AppState> {
        let manager = Arc::new(ConnectionManager::new(":memory:", false).unwrap());
        {
            let cursor = manager.acquire().unwrap();
            cursor
                .execute_batch(
                    "CREATE MACRO greet(name) AS 'Hello, ' || name || '!';
                     CREATE MACRO words() AS TABLE SELECT 'hi' AS w;",
                )
                .unwrap();
        }
        Arc::new(AppState::new(Settings::default(), manager))
    }

    #[test]
    fn test_generate_all_is_idempotent() {
        let state = test_state();
        let mut synthesizer = RouteSynthesizer::new(state);

        synthesizer.generate_all().unwrap();
        let first = synthesizer.registered_names();
        synthesizer.generate_all().unwrap();
        let second = synthesizer.registered_names();

        assert_eq!(first, vec!["greet", "words"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_filter_query_params_drops_blank_values() {
        let mut params = HashMap::new();
        params.insert("keep".to_string(), "value".to_string());
        params.insert("blank".to_string(), "".to_string());
        params.insert("spaces".to_string(), "   ".to_string());

        let filtered = filter_query_params(params);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get("keep"), Some(&json!("value")));
    }

    #[test]
    fn test_request_limits() {
        let state = test_state();

        let mut underscore = HashMap::new();
        underscore.insert("_hidden".to_string(), json!("x"));
        assert!(validate_request_limits(&state, &underscore).is_err());

        let mut dollar = HashMap::new();
        dollar.insert("$var".to_string(), json!("x"));
        assert!(validate_request_limits(&state, &dollar).is_err());

        let mut oversized = HashMap::new();
        oversized.insert("v".to_string(), json!("x".repeat(10_001)));
        assert!(validate_request_limits(&state, &oversized).is_err());

        let mut fine = HashMap::new();
        fine.insert("v".to_string(), json!("x"));
        assert!(validate_request_limits(&state, &fine).is_ok());
    }
}
