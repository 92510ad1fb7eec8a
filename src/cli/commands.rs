//! CLI command implementations
//!
//! `serve` owns the full lifecycle: settings, connection manager, cache
//! priming, route synthesis, serving, shutdown. `macros` is the one-shot
//! discovery command for scripting and smoke checks.

use std::sync::Arc;

use crate::catalog::MacroCatalog;
use crate::config::Settings;
use crate::connection::ConnectionManager;
use crate::http_server::{AppState, HttpServer};
use crate::observability::{Logger, Severity};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Parse arguments and dispatch to the matching command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    match cli.command {
        Command::Serve {
            database,
            readonly,
            host,
            port,
            api_prefix,
            log_level,
        } => {
            let settings = serve_settings(
                Settings::from_env(),
                database,
                readonly,
                host,
                port,
                api_prefix,
                log_level,
            );
            serve(settings)
        }
        Command::Macros { database } => macros(&database),
    }
}

/// Layer CLI flags over env-derived settings. Only flags actually supplied
/// override; absent flags leave the env value (or default) in place. The
/// readonly flag can only force read-only on, never off.
fn serve_settings(
    mut settings: Settings,
    database: String,
    readonly: bool,
    host: Option<String>,
    port: Option<u16>,
    api_prefix: Option<String>,
    log_level: Option<String>,
) -> Settings {
    settings.database_path = database;
    if readonly {
        settings.read_only = true;
    }
    if let Some(host) = host {
        settings.host = host;
    }
    if let Some(port) = port {
        settings.port = port;
    }
    if let Some(prefix) = api_prefix {
        settings.api_prefix = prefix;
    }
    if let Some(level) = log_level {
        settings.log_level = level;
    }
    settings
}

/// Boot the server: open the database, verify it answers, prime the macro
/// cache, synthesize routes, serve until shutdown.
pub fn serve(settings: Settings) -> CliResult<()> {
    Logger::set_min_level(Severity::from_name(&settings.log_level));

    let manager = Arc::new(ConnectionManager::new(
        &settings.database_path,
        settings.read_only,
    )?);

    if !manager.test_connection() {
        return Err(CliError::Run(format!(
            "database at '{}' did not answer a trivial query",
            settings.database_path
        )));
    }

    let state = Arc::new(AppState::new(settings, manager));
    state.catalog.prime_cache()?;

    let server = HttpServer::new(Arc::clone(&state))?;

    let runtime = tokio::runtime::Runtime::new().map_err(|e| CliError::Run(e.to_string()))?;
    runtime.block_on(server.start())?;
    Ok(())
}

/// One-shot discovery: print every descriptor as a JSON array on stdout
pub fn macros(database: &str) -> CliResult<()> {
    let manager = Arc::new(ConnectionManager::new(database, true)?);
    let catalog = MacroCatalog::new(Arc::clone(&manager));

    let discovered = catalog.discover()?;
    let descriptors: Vec<_> = discovered.iter().map(|m| (**m).clone()).collect();
    println!("{}", serde_json::to_string_pretty(&descriptors)?);

    manager.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_layer() -> Settings {
        let mut settings = Settings::default();
        settings.port = 9000;
        settings.host = "10.0.0.1".to_string();
        settings.log_level = "debug".to_string();
        settings
    }

    #[test]
    fn test_absent_flags_keep_env_values() {
        let settings = serve_settings(
            env_layer(),
            "db.duckdb".to_string(),
            false,
            None,
            None,
            None,
            None,
        );
        assert_eq!(settings.database_path, "db.duckdb");
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.host, "10.0.0.1");
        assert_eq!(settings.log_level, "debug");
        assert!(settings.read_only);
    }

    #[test]
    fn test_supplied_flags_win_over_env() {
        let settings = serve_settings(
            env_layer(),
            "db.duckdb".to_string(),
            true,
            Some("127.0.0.1".to_string()),
            Some(8080),
            Some("/api/v2".to_string()),
            Some("warn".to_string()),
        );
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.api_prefix, "/api/v2");
        assert_eq!(settings.log_level, "warn");
        assert!(settings.read_only);
    }

    #[test]
    fn test_readonly_flag_cannot_disable_read_only() {
        let mut base = env_layer();
        base.read_only = true;
        let settings = serve_settings(
            base,
            "db.duckdb".to_string(),
            false,
            None,
            None,
            None,
            None,
        );
        assert!(settings.read_only);
    }
}
