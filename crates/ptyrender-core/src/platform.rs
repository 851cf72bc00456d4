//! Platform detection for backend selection.
//!
//! Backends declare the platforms they run on; the registry compares those
//! tags against the platform detected at runtime.

use serde::{Deserialize, Serialize};

/// Platform tags used to rank PTY backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Native Linux (not WSL)
    Linux,
    /// macOS
    MacOS,
    /// Native Windows
    Windows,
    /// Windows Subsystem for Linux
    WSL,
    /// Any other Unix-like target
    Other,
}

impl Platform {
    /// Every Unix-like platform tag.
    pub const UNIX: &'static [Platform] = &[
        Platform::Linux,
        Platform::MacOS,
        Platform::WSL,
        Platform::Other,
    ];

    /// Every platform tag.
    pub const ALL: &'static [Platform] = &[
        Platform::Linux,
        Platform::MacOS,
        Platform::Windows,
        Platform::WSL,
        Platform::Other,
    ];

    /// Detect the current platform at runtime.
    ///
    /// WSL is recognized by a `microsoft` kernel version string or the
    /// `WSLInterop` binfmt entry.
    pub fn detect() -> Self {
        #[cfg(target_os = "linux")]
        {
            if Self::is_wsl() {
                return Platform::WSL;
            }
            Platform::Linux
        }

        #[cfg(target_os = "macos")]
        {
            Platform::MacOS
        }

        #[cfg(target_os = "windows")]
        {
            Platform::Windows
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            Platform::Other
        }
    }

    #[cfg(target_os = "linux")]
    fn is_wsl() -> bool {
        if let Ok(version) = std::fs::read_to_string("/proc/version") {
            if version.to_lowercase().contains("microsoft") {
                return true;
            }
        }

        std::path::Path::new("/proc/sys/fs/binfmt_misc/WSLInterop").exists()
    }

    /// Get the platform name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Linux => "Linux",
            Platform::MacOS => "macOS",
            Platform::Windows => "Windows",
            Platform::WSL => "WSL",
            Platform::Other => "Other",
        }
    }

    /// Check if this is a Unix-like platform.
    pub fn is_unix(&self) -> bool {
        !matches!(self, Platform::Windows)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_detect() {
        let platform = Platform::detect();
        assert!(Platform::ALL.contains(&platform));
        assert_eq!(platform.is_unix(), cfg!(unix));
    }

    #[test]
    fn test_platform_name() {
        assert_eq!(Platform::Linux.name(), "Linux");
        assert_eq!(Platform::MacOS.name(), "macOS");
        assert_eq!(Platform::Windows.name(), "Windows");
        assert_eq!(Platform::WSL.name(), "WSL");
    }

    #[test]
    fn test_unix_tags() {
        assert!(Platform::UNIX.iter().all(Platform::is_unix));
        assert!(!Platform::UNIX.contains(&Platform::Windows));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Platform::WSL), "WSL");
        assert_eq!(format!("{}", Platform::MacOS), "macOS");
    }
}
