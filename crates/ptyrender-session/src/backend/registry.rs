//! Backend registry and fallback selection.
//!
//! Candidates are ranked by kind tier (native PTY, then emulated PTY, then
//! subprocess) and by registration order within a tier. Selection walks the
//! ranking once per request and stops at the first backend that starts.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{debug, info, warn};

use ptyrender_core::{AttemptOutcome, BackendAttempt, BackendSettings, Error, Platform, Result};

use super::{BackendHandle, BackendKind, Capabilities, ExecRequest, PtyBackend};

const UNKNOWN: u8 = 0;
const AVAILABLE: u8 = 1;
const UNAVAILABLE: u8 = 2;

struct Registration {
    backend: Box<dyn PtyBackend>,
    availability: AtomicU8,
}

impl Registration {
    fn new(backend: Box<dyn PtyBackend>) -> Self {
        Self {
            backend,
            availability: AtomicU8::new(UNKNOWN),
        }
    }

    fn probe(&self) -> bool {
        let available = self.backend.is_available();
        let state = if available { AVAILABLE } else { UNAVAILABLE };
        self.availability.store(state, Ordering::Release);
        available
    }

    fn cached_availability(&self) -> bool {
        match self.availability.load(Ordering::Acquire) {
            AVAILABLE => true,
            UNAVAILABLE => false,
            _ => self.probe(),
        }
    }
}

/// A backend that reached the running state.
pub struct Running {
    /// Name of the selected backend
    pub backend_name: &'static str,
    /// Kind of the selected backend
    pub kind: BackendKind,
    /// Features of the selected backend
    pub capabilities: Capabilities,
    /// The live command
    pub handle: Box<dyn BackendHandle>,
    /// Candidates that were skipped or failed before this one
    pub attempts: Vec<BackendAttempt>,
}

impl fmt::Debug for Running {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Running")
            .field("backend_name", &self.backend_name)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

/// Process-scoped set of PTY backends with cached availability.
pub struct BackendRegistry {
    platform: Platform,
    registrations: Vec<Registration>,
    settings: BackendSettings,
}

impl BackendRegistry {
    /// Create an empty registry for `platform`.
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            registrations: Vec::new(),
            settings: BackendSettings::default(),
        }
    }

    /// Registry with the built-in backends for `platform`.
    pub fn default_for(platform: Platform) -> Self {
        let mut registry = Self::new(platform);
        #[cfg(unix)]
        registry.register(super::UnixPtyBackend::new());
        registry.register(super::PortablePtyBackend::new());
        registry.register(super::SubprocessBackend::new());
        registry
    }

    /// Registry with the given backends, in registration order.
    pub fn with_backends(platform: Platform, backends: Vec<Box<dyn PtyBackend>>) -> Self {
        Self {
            platform,
            registrations: backends.into_iter().map(Registration::new).collect(),
            settings: BackendSettings::default(),
        }
    }

    /// Add a backend after the existing ones.
    pub fn register(&mut self, backend: impl PtyBackend + 'static) {
        debug!("Registering backend '{}'", backend.name());
        self.registrations
            .push(Registration::new(Box::new(backend)));
    }

    /// Apply selection settings from configuration.
    pub fn with_settings(mut self, settings: BackendSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Exclude a backend from selection.
    pub fn disable(&mut self, name: &str) {
        if !self.settings.is_disabled(name) {
            self.settings.disabled.push(name.to_string());
        }
    }

    /// Exclude every backend except `name`.
    pub fn restrict_to(&mut self, name: &str) -> Result<()> {
        if self.find(name).is_none() {
            return Err(Error::Config(format!("unknown backend '{name}'")));
        }
        let others: Vec<&'static str> = self
            .names()
            .filter(|other| !other.eq_ignore_ascii_case(name))
            .collect();
        for other in others {
            self.disable(other);
        }
        Ok(())
    }

    /// Platform used for candidate filtering.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Registered backend names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.registrations.iter().map(|r| r.backend.name())
    }

    fn find(&self, name: &str) -> Option<&Registration> {
        self.registrations
            .iter()
            .find(|r| r.backend.name().eq_ignore_ascii_case(name))
    }

    /// Re-run the availability check for one backend.
    ///
    /// Returns `None` if no backend has that name.
    pub fn recheck(&self, name: &str) -> Option<bool> {
        let registration = self.find(name)?;
        let available = registration.probe();
        info!("Backend '{}' availability rechecked: {}", name, available);
        Some(available)
    }

    /// Forget every cached availability answer.
    pub fn invalidate_all(&self) {
        for registration in &self.registrations {
            registration.availability.store(UNKNOWN, Ordering::Release);
        }
        debug!("Backend availability cache cleared");
    }

    /// Registrations in selection order.
    fn ranked(&self) -> Vec<&Registration> {
        let mut ranked: Vec<(usize, &Registration)> =
            self.registrations.iter().enumerate().collect();
        ranked.sort_by_key(|(index, r)| (r.backend.kind().tier(), *index));
        ranked.into_iter().map(|(_, r)| r).collect()
    }

    /// Start `request` on the best backend that works.
    ///
    /// Every skipped or failed candidate is recorded; if none starts the
    /// error lists all of them.
    pub fn select(&self, request: &ExecRequest) -> Result<Running> {
        let mut attempts = Vec::new();

        for registration in self.ranked() {
            let backend = registration.backend.as_ref();
            let name = backend.name();

            if self.settings.is_disabled(name) {
                debug!("Backend '{}' disabled by configuration", name);
                attempts.push(BackendAttempt::new(name, AttemptOutcome::Disabled));
                continue;
            }

            if !backend.platforms().contains(&self.platform)
                || !registration.cached_availability()
            {
                warn!("Backend '{}' unavailable on {}, skipping", name, self.platform);
                attempts.push(BackendAttempt::new(name, AttemptOutcome::Unavailable));
                continue;
            }

            debug!("Attempting backend '{}' ({})", name, backend.kind());
            match backend.start(request) {
                Ok(handle) => {
                    info!(
                        "Backend '{}' running '{}' after {} skipped",
                        name,
                        request.display_command(),
                        attempts.len()
                    );
                    return Ok(Running {
                        backend_name: name,
                        kind: backend.kind(),
                        capabilities: backend.capabilities(),
                        handle,
                        attempts,
                    });
                }
                Err(e) => {
                    warn!("Backend '{}' failed to start: {}", name, e);
                    attempts.push(BackendAttempt::new(name, AttemptOutcome::Failed(e.to_string())));
                }
            }
        }

        warn!(
            "All backends exhausted for '{}'",
            request.display_command()
        );
        Err(Error::BackendsExhausted { attempts })
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::default_for(Platform::detect())
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("platform", &self.platform)
            .field("backends", &self.names().collect::<Vec<_>>())
            .field("settings", &self.settings)
            .finish()
    }
}
