//! HTTP server assembly
//!
//! Combines health routes, management routes and the synthesized dynamic
//! routes into one axum router behind CORS and the correlation middleware.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::errors::{MacroError, MacroResult};
use crate::observability::Logger;

use super::api_routes::api_routes;
use super::dynamic_routes::RouteSynthesizer;
use super::health_routes::health_routes;
use super::middleware;
use super::state::AppState;

/// HTTP server for the macro bridge
pub struct HttpServer {
    state: Arc<AppState>,
    router: Router,
}

impl HttpServer {
    /// Build the full router. The catalog is discovered here so that the
    /// dynamic routes exist before the listener accepts traffic.
    pub fn new(state: Arc<AppState>) -> MacroResult<Self> {
        let mut synthesizer = RouteSynthesizer::new(Arc::clone(&state));
        let dynamic = synthesizer.generate_all()?;
        Logger::info(
            "ROUTES_SYNTHESIZED",
            &[(
                "count",
                synthesizer.registered_names().len().to_string().as_str(),
            )],
        );

        let prefix = state.settings.api_prefix.trim_end_matches('/').to_string();
        let cors = Self::cors_layer(&state.settings.cors_origins);

        let router = Router::new()
            .merge(health_routes(Arc::clone(&state)))
            .nest(&prefix, api_routes(Arc::clone(&state)))
            .nest(&format!("{}/execute", prefix), dynamic)
            .layer(axum::middleware::from_fn(middleware::correlation_id))
            .layer(cors);

        Ok(Self { state, router })
    }

    fn cors_layer(origins: &[String]) -> CorsLayer {
        if origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parsed))
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }

    /// Router (for tests)
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until ctrl-c, then close the connection manager
    pub async fn start(self) -> MacroResult<()> {
        let addr: SocketAddr = self
            .state
            .settings
            .socket_addr()
            .parse()
            .map_err(|e| MacroError::Config(format!("invalid bind address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| MacroError::Config(format!("failed to bind {}: {}", addr, e)))?;

        Logger::info(
            "SERVER_STARTED",
            &[
                ("addr", addr.to_string().as_str()),
                ("database", self.state.manager.db_path()),
            ],
        );

        let state = Arc::clone(&self.state);
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .map_err(|e| MacroError::Config(format!("server error: {}", e)))?;

        state.manager.close();
        Logger::info("SERVER_STOPPED", &[]);
        Ok(())
    }
}
