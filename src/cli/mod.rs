//! CLI module
//!
//! Commands:
//! - serve: boot the REST server for one database
//! - macros: one-shot discovery listing to stdout

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{macros, run, serve};
pub use errors::{CliError, CliResult};
