//! Configuration types for ptyrender.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Dimensions, Error};

/// Top-level configuration loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Process-wide settings
    pub server: ServerSettings,
    /// Terminal settings
    pub terminal: TerminalSettings,
    /// Binary content gate settings
    pub gate: GateSettings,
    /// Output buffering and event delivery
    pub output: OutputSettings,
    /// Backend selection settings
    pub backends: BackendSettings,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: Config =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.max_sessions == 0 {
            return Err(Error::Config("server.max_sessions must be > 0".into()));
        }

        self.terminal
            .dimensions()
            .validate()
            .map_err(|_| Error::Config("terminal dimensions must be > 0".into()))?;

        self.gate.validate()?;

        if self.output.max_size == 0 {
            return Err(Error::Config("output.max_size must be > 0".into()));
        }
        if self.output.event_queue_capacity == 0 {
            return Err(Error::Config(
                "output.event_queue_capacity must be > 0".into(),
            ));
        }
        if self.output.read_chunk_size == 0 {
            return Err(Error::Config("output.read_chunk_size must be > 0".into()));
        }

        Ok(())
    }
}

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Maximum number of concurrent sessions
    pub max_sessions: usize,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            max_sessions: 10,
            log_level: "info".to_string(),
        }
    }
}

/// Terminal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSettings {
    /// Default terminal columns
    pub default_cols: u16,
    /// Default terminal rows
    pub default_rows: u16,
    /// TERM environment variable value
    pub term: String,
}

impl TerminalSettings {
    /// Default screen size.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.default_rows, self.default_cols)
    }
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            default_cols: 80,
            default_rows: 24,
            term: "xterm-256color".to_string(),
        }
    }
}

/// Binary content gate settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    /// Number of leading bytes inspected per chunk
    pub sample_size: usize,
    /// Null-byte ratio above which a chunk is binary
    pub null_threshold: f64,
    /// Control-byte ratio (excluding TAB, LF, CR) above which a chunk is binary
    pub control_threshold: f64,
}

impl GateSettings {
    fn validate(&self) -> crate::Result<()> {
        if self.sample_size == 0 {
            return Err(Error::Config("gate.sample_size must be > 0".into()));
        }
        for (name, value) in [
            ("gate.null_threshold", self.null_threshold),
            ("gate.control_threshold", self.control_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Error::Config(format!("{name} must be in (0, 1]")));
            }
        }
        Ok(())
    }
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            sample_size: 1024,
            null_threshold: 0.3,
            control_threshold: 0.1,
        }
    }
}

/// Output buffering and event delivery settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Maximum bytes of rendered text retained per session
    pub max_size: usize,
    /// Events queued per subscriber before the oldest is dropped
    pub event_queue_capacity: usize,
    /// Maximum bytes per backend read
    pub read_chunk_size: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            max_size: 1024 * 1024,
            event_queue_capacity: 64,
            read_chunk_size: 4096,
        }
    }
}

/// Backend selection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Backend names excluded from selection
    pub disabled: Vec<String>,
}

impl BackendSettings {
    /// Check if a backend was disabled by name (case-insensitive).
    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled
            .iter()
            .any(|disabled| disabled.eq_ignore_ascii_case(name))
    }
}
