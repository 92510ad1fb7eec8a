//! Process configuration
//!
//! Settings are built from defaults, then `QUICKQUACK_*` environment
//! variables, then CLI flags (strongest). Database-path validation is the
//! connection manager's job, not the settings layer's.

use serde::{Deserialize, Serialize};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the DuckDB database file
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Open the database in read-only mode
    #[serde(default = "default_read_only")]
    pub read_only: bool,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Prefix for the management API and dynamic routes
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// CORS allowed origins; empty means permissive
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Query timeout in seconds, enforced around driver calls by the
    /// HTTP layer
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Minimum log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum number of parameters accepted in one execution request
    #[serde(default = "default_max_parameters")]
    pub max_parameters: usize,

    /// Maximum length of a single string parameter value
    #[serde(default = "default_max_value_length")]
    pub max_value_length: usize,
}

fn default_database_path() -> String {
    "data/database.duckdb".to_string()
}

fn default_read_only() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_query_timeout_secs() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_parameters() -> usize {
    50
}

fn default_max_value_length() -> usize {
    10_000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            read_only: default_read_only(),
            host: default_host(),
            port: default_port(),
            api_prefix: default_api_prefix(),
            cors_origins: default_cors_origins(),
            query_timeout_secs: default_query_timeout_secs(),
            log_level: default_log_level(),
            max_parameters: default_max_parameters(),
            max_value_length: default_max_value_length(),
        }
    }
}

impl Settings {
    /// Build settings from defaults overridden by `QUICKQUACK_*` env vars
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(v) = std::env::var("QUICKQUACK_DATABASE_PATH") {
            settings.database_path = v;
        }
        if let Ok(v) = std::env::var("QUICKQUACK_READ_ONLY") {
            settings.read_only = matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes");
        }
        if let Ok(v) = std::env::var("QUICKQUACK_HOST") {
            settings.host = v;
        }
        if let Ok(v) = std::env::var("QUICKQUACK_PORT") {
            if let Ok(port) = v.parse() {
                settings.port = port;
            }
        }
        if let Ok(v) = std::env::var("QUICKQUACK_API_PREFIX") {
            settings.api_prefix = v;
        }
        if let Ok(v) = std::env::var("QUICKQUACK_QUERY_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse() {
                settings.query_timeout_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("QUICKQUACK_LOG_LEVEL") {
            settings.log_level = v;
        }
        if let Ok(v) = std::env::var("QUICKQUACK_CORS_ORIGINS") {
            settings.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = std::env::var("QUICKQUACK_MAX_PARAMETERS") {
            if let Ok(n) = v.parse() {
                settings.max_parameters = n;
            }
        }
        if let Ok(v) = std::env::var("QUICKQUACK_MAX_VALUE_LENGTH") {
            if let Ok(n) = v.parse() {
                settings.max_value_length = n;
            }
        }
        settings
    }

    /// Socket address string for the HTTP listener
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.port, 8000);
        assert!(settings.read_only);
        assert_eq!(settings.api_prefix, "/api/v1");
        assert_eq!(settings.max_parameters, 50);
    }

    #[test]
    fn test_socket_addr() {
        let mut settings = Settings::default();
        settings.host = "127.0.0.1".to_string();
        settings.port = 9001;
        assert_eq!(settings.socket_addr(), "127.0.0.1:9001");
    }

    #[test]
    fn test_env_overrides_request_limits() {
        std::env::set_var("QUICKQUACK_MAX_PARAMETERS", "7");
        std::env::set_var("QUICKQUACK_MAX_VALUE_LENGTH", "99");

        let settings = Settings::from_env();
        assert_eq!(settings.max_parameters, 7);
        assert_eq!(settings.max_value_length, 99);

        std::env::remove_var("QUICKQUACK_MAX_PARAMETERS");
        std::env::remove_var("QUICKQUACK_MAX_VALUE_LENGTH");
    }

    #[test]
    fn test_deserialize_partial() {
        let settings: Settings =
            serde_json::from_str(r#"{"database_path": "data/test.duckdb"}"#).unwrap();
        assert_eq!(settings.database_path, "data/test.duckdb");
        assert_eq!(settings.port, 8000);
    }
}
