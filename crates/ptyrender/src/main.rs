//! # ptyrender
//!
//! Runs a command behind a pseudo-terminal and writes its rendered screen
//! to stdout as JSON lines, one event per line.
//!
//! Backends are tried in order (native PTY, portable PTY, plain
//! subprocess) until one starts. Logs go to stderr; set `RUST_LOG` or the
//! `server.log_level` configuration key to change verbosity.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ptyrender::cli::Cli;
use ptyrender::runner;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = cli
        .load_config()
        .map(|config| config.server.log_level)
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("ptyrender v{} starting", env!("CARGO_PKG_VERSION"));

    let code = match runner::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("ptyrender: {:#}", e);
            1
        }
    };

    std::process::exit(code);
}
