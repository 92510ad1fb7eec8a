//! HTTP transport: static management routes, health routes and the
//! dynamically synthesized per-macro routes.

mod api_routes;
mod dynamic_routes;
mod errors;
mod health_routes;
mod middleware;
mod server;
mod state;

pub use dynamic_routes::RouteSynthesizer;
pub use errors::ApiError;
pub use server::HttpServer;
pub use state::AppState;
