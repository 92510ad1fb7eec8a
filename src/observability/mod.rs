//! Observability: structured logging for the macro bridge

pub mod logger;

pub use logger::{Logger, Severity};
