//! HTTP error mapping
//!
//! Wraps `MacroError` for axum, keeping the stable classification codes in
//! the response body so clients never need to parse message text.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::errors::MacroError;

/// Errors produced at the HTTP boundary
#[derive(Debug)]
pub enum ApiError {
    /// A core error with its own classification
    Macro(MacroError),
    /// The collaborator-enforced query timeout fired
    Timeout { macro_name: String, seconds: u64 },
    /// Request rejected by the validation limits
    InvalidRequest(String),
    /// Worker task failed before producing a result
    Internal(String),
}

impl From<MacroError> for ApiError {
    fn from(e: MacroError) -> Self {
        Self::Macro(e)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Macro(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Macro(e) => e.code(),
            Self::Timeout { .. } => "TIMEOUT",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Macro(e) => e.to_string(),
            Self::Timeout { macro_name, seconds } => format!(
                "Macro '{}' did not finish within {} seconds",
                macro_name, seconds
            ),
            Self::InvalidRequest(msg) => msg.clone(),
            Self::Internal(msg) => msg.clone(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::Macro(MacroError::NotFound { name, available }) => {
                let mut details = serde_json::Map::new();
                details.insert("macro_name".to_string(), Value::String(name.clone()));
                if !available.is_empty() {
                    details.insert(
                        "available_macros".to_string(),
                        Value::Array(
                            available.iter().cloned().map(Value::String).collect(),
                        ),
                    );
                }
                Some(Value::Object(details))
            }
            Self::Macro(MacroError::Parameter {
                parameter,
                expected_type,
                value,
                ..
            }) => {
                let mut details = serde_json::Map::new();
                if let Some(p) = parameter {
                    details.insert("parameter_name".to_string(), Value::String(p.clone()));
                }
                if let Some(t) = expected_type {
                    details.insert("expected_type".to_string(), Value::String(t.clone()));
                }
                if let Some(v) = value {
                    details.insert("provided_value".to_string(), Value::String(v.clone()));
                }
                (!details.is_empty()).then_some(Value::Object(details))
            }
            Self::Macro(MacroError::Execution { name, message }) => Some(serde_json::json!({
                "macro_name": name,
                "original_error": message,
            })),
            _ => None,
        }
    }
}

/// Structured error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            error: self.code(),
            message: self.message(),
            details: self.details(),
        });
        (status, body).into_response()
    }
}
