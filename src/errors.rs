//! Error taxonomy for the macro bridge
//!
//! Each variant maps to a stable classification code so the HTTP layer can
//! choose a status without inspecting message text. The only message-based
//! rule in the whole crate is the "does not exist" reclassification applied
//! by the execution engine (see `executor::engine`).

use thiserror::Error;

/// Result type for macro bridge operations
pub type MacroResult<T> = Result<T, MacroError>;

/// Errors surfaced by the catalog, coercion and execution subsystems
#[derive(Debug, Clone, Error)]
pub enum MacroError {
    /// Unknown macro name, at lookup time or reclassified from execution
    #[error("Macro '{name}' not found")]
    NotFound {
        name: String,
        /// Up to 10 sample names to help the caller, may be empty
        available: Vec<String>,
    },

    /// Parameter count mismatch or type-conversion failure
    #[error("{message}")]
    Parameter {
        message: String,
        parameter: Option<String>,
        expected_type: Option<String>,
        value: Option<String>,
    },

    /// Underlying engine failure, message forwarded verbatim
    #[error("Failed to execute macro '{name}': {message}")]
    Execution { name: String, message: String },

    /// Physical handle unavailable or corrupt at acquire time
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Invalid configuration (bad database path, bad settings value)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MacroError {
    /// Shorthand for a not-found error without sample names
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            available: Vec::new(),
        }
    }

    /// Shorthand for a bare parameter error
    pub fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter {
            message: message.into(),
            parameter: None,
            expected_type: None,
            value: None,
        }
    }

    /// Parameter error carrying name, expected type and offending value
    pub fn conversion(
        parameter: impl Into<String>,
        expected_type: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let parameter = parameter.into();
        Self::Parameter {
            message: format!(
                "Invalid value for parameter '{}': {}",
                parameter,
                reason.into()
            ),
            parameter: Some(parameter),
            expected_type: Some(expected_type.into()),
            value: Some(value.into()),
        }
    }

    /// Stable classification code for collaborators
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Parameter { .. } => "PARAMETER_ERROR",
            Self::Execution { .. } => "EXECUTION_ERROR",
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// HTTP status code for API responses
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Parameter { .. } => 400,
            Self::Execution { .. } => 500,
            Self::Connection(_) => 503,
            Self::Config(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(MacroError::not_found("m").status_code(), 404);
        assert_eq!(MacroError::parameter("bad").status_code(), 400);
        assert_eq!(
            MacroError::Execution {
                name: "m".to_string(),
                message: "boom".to_string(),
            }
            .status_code(),
            500
        );
        assert_eq!(MacroError::Connection("gone".to_string()).status_code(), 503);
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(MacroError::not_found("m").code(), "NOT_FOUND");
        assert_eq!(MacroError::parameter("bad").code(), "PARAMETER_ERROR");
    }

    #[test]
    fn test_conversion_carries_details() {
        let err = MacroError::conversion("age", "INTEGER", "abc", "not a number");
        match err {
            MacroError::Parameter {
                parameter,
                expected_type,
                value,
                message,
            } => {
                assert_eq!(parameter.as_deref(), Some("age"));
                assert_eq!(expected_type.as_deref(), Some("INTEGER"));
                assert_eq!(value.as_deref(), Some("abc"));
                assert!(message.contains("age"));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
