//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use ptyrender_core::{Config, Result};

/// Run a command behind a pseudo-terminal and stream its rendered screen as
/// JSON lines on stdout.
#[derive(Debug, Clone, Parser)]
#[command(name = "ptyrender", version, about)]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Terminal columns (overrides the configuration)
    #[arg(long, value_name = "N")]
    pub cols: Option<u16>,

    /// Terminal rows (overrides the configuration)
    #[arg(long, value_name = "N")]
    pub rows: Option<u16>,

    /// Only try this backend (unix-pty, portable-pty, subprocess)
    #[arg(short, long, value_name = "NAME")]
    pub backend: Option<String>,

    /// Working directory for the command
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Forward standard input to the command
    #[arg(long)]
    pub stdin: bool,

    /// Print the JSON schema of emitted events and exit
    #[arg(long)]
    pub schema: bool,

    /// List registered backends with their availability and exit
    #[arg(long)]
    pub list_backends: bool,

    /// Command to run, followed by its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Cli {
    /// Load the configuration file, if any, and apply command-line overrides.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(cols) = self.cols {
            config.terminal.default_cols = cols;
        }
        if let Some(rows) = self.rows {
            config.terminal.default_rows = rows;
        }

        config.validate()?;
        Ok(config)
    }
}
