//! Shared state for HTTP handlers

use std::sync::Arc;
use std::time::Instant;

use crate::catalog::MacroCatalog;
use crate::config::Settings;
use crate::connection::ConnectionManager;
use crate::executor::MacroExecutor;

/// State shared across all handlers
pub struct AppState {
    pub settings: Settings,
    pub manager: Arc<ConnectionManager>,
    pub catalog: Arc<MacroCatalog>,
    pub executor: Arc<MacroExecutor>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(settings: Settings, manager: Arc<ConnectionManager>) -> Self {
        let catalog = Arc::new(MacroCatalog::new(Arc::clone(&manager)));
        let executor = Arc::new(MacroExecutor::new(
            Arc::clone(&manager),
            Arc::clone(&catalog),
        ));
        Self {
            settings,
            manager,
            catalog,
            executor,
            started_at: Instant::now(),
        }
    }

    /// Seconds since this state was built (process warm-up)
    pub fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}
