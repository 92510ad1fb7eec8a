//! quickquack - expose DuckDB macros as REST endpoints
//!
//! A thin bridge over an embedded DuckDB database: macros defined in the
//! database are discovered through `duckdb_functions()`, cached, and served
//! as individually addressable HTTP operations with typed parameter
//! coercion.

pub mod catalog;
pub mod cli;
pub mod coercion;
pub mod config;
pub mod connection;
pub mod errors;
pub mod executor;
pub mod http_server;
pub mod observability;
