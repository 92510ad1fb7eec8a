//! CLI-specific error types

use thiserror::Error;

use crate::errors::MacroError;

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

/// Errors surfaced by CLI commands; all are fatal to the process
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad flags or an unusable database path
    #[error("QUACK_CLI_CONFIG_ERROR: {0}")]
    Config(String),

    /// Server or one-shot command failed
    #[error("QUACK_CLI_RUN_ERROR: {0}")]
    Run(String),

    /// Output serialization failed
    #[error("QUACK_CLI_IO_ERROR: {0}")]
    Io(String),
}

impl From<MacroError> for CliError {
    fn from(e: MacroError) -> Self {
        match e {
            MacroError::Config(msg) => Self::Config(msg),
            other => Self::Run(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::Io(e.to_string())
    }
}
