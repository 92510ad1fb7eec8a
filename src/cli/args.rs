//! CLI argument definitions using clap
//!
//! Commands:
//! - quickquack serve <DATABASE> [--readonly] [--host] [--port] ...
//! - quickquack macros <DATABASE>

use clap::{Parser, Subcommand};

/// quickquack - expose DuckDB macros as REST endpoints
#[derive(Parser, Debug)]
#[command(name = "quickquack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the REST server
    Serve {
        /// Path to the DuckDB database file (relative, no '..' segments)
        database: String,

        /// Force read-only mode
        #[arg(long, short = 'r')]
        readonly: bool,

        /// Host to bind the server to (default from QUICKQUACK_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind the server to (default from QUICKQUACK_PORT)
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// Prefix for management and dynamic routes
        #[arg(long)]
        api_prefix: Option<String>,

        /// Minimum log level (debug, info, warn, error)
        #[arg(long)]
        log_level: Option<String>,
    },

    /// Discover macros and print them as JSON
    Macros {
        /// Path to the DuckDB database file
        database: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
