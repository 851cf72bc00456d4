//! Session manager for coordinating multiple terminal sessions.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use ptyrender_core::{Config, Dimensions, Error, Platform, Result, SessionId, SessionStatus};

use crate::backend::{BackendRegistry, ExecRequest};
use crate::events::EventReceiver;
use crate::session::{Session, SessionHandle, SessionSettings};

/// Session manager for coordinating multiple terminal sessions.
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<SessionHandle>>>,
    registry: Arc<BackendRegistry>,
    config: Config,
}

impl SessionManager {
    /// Create a manager with default configuration and the built-in backends.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a manager with the built-in backends for the current platform.
    pub fn with_config(config: Config) -> Self {
        let registry = BackendRegistry::default_for(Platform::detect())
            .with_settings(config.backends.clone());
        Self::with_registry(config, Arc::new(registry))
    }

    /// Create a manager selecting backends from `registry`.
    pub fn with_registry(config: Config, registry: Arc<BackendRegistry>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            registry,
            config,
        }
    }

    /// Backend registry shared by all sessions.
    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Request for `command` carrying the configured defaults.
    pub fn exec_request(&self, command: impl Into<String>) -> ExecRequest {
        ExecRequest::new(command)
            .dimensions(self.config.terminal.dimensions())
            .term(&self.config.terminal.term)
            .chunk_size(self.config.output.read_chunk_size)
    }

    /// Create a new terminal session.
    pub fn create_session(
        &self,
        command: String,
        args: Vec<String>,
        dimensions: Option<Dimensions>,
    ) -> Result<(Arc<SessionHandle>, EventReceiver)> {
        let mut request = self.exec_request(command).args(args);
        if let Some(dimensions) = dimensions {
            request = request.dimensions(dimensions);
        }
        self.spawn(request)
    }

    /// Create a session from a fully built request.
    ///
    /// The write lock is held from the limit check until the insert, so
    /// concurrent spawns never exceed `max_sessions`.
    pub fn spawn(&self, request: ExecRequest) -> Result<(Arc<SessionHandle>, EventReceiver)> {
        let max_sessions = self.config.server.max_sessions;
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.len() >= max_sessions {
            warn!("Session limit reached ({})", max_sessions);
            return Err(Error::SessionLimitReached(max_sessions));
        }

        let (session, events) =
            Session::spawn(request, &self.registry, SessionSettings::from(&self.config))?;
        let session = Arc::new(session);
        sessions.insert(session.id(), Arc::clone(&session));

        Ok((session, events))
    }

    fn read_sessions(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<SessionId, Arc<SessionHandle>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a session by ID.
    pub fn get_session(&self, session_id: &SessionId) -> Result<Arc<SessionHandle>> {
        self.read_sessions()
            .get(session_id)
            .cloned()
            .ok_or(Error::SessionNotFound(*session_id))
    }

    /// List sessions, dropping those that already finished.
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|id, session| {
            let keep = !session.is_finished();
            if !keep {
                debug!("Reaping finished session {}", id);
            }
            keep
        });

        sessions
            .values()
            .map(|session| SessionInfo {
                session_id: session.id(),
                command: session.command().to_string(),
                backend_name: session.backend_name().to_string(),
                status: session.status(),
                created_at: session.created_at(),
            })
            .collect()
    }

    /// Resize a session's screen.
    pub async fn resize_session(&self, session_id: &SessionId, dimensions: Dimensions) -> Result<()> {
        let session = self.get_session(session_id)?;
        session.resize(dimensions).await
    }

    /// Close a session by ID.
    pub async fn close_session(&self, session_id: &SessionId) -> Result<()> {
        let session = self.get_session(session_id)?;
        session.terminate().await?;

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
        info!("Session {} closed", session_id);

        Ok(())
    }

    /// Close all sessions.
    pub async fn close_all(&self) -> Result<()> {
        let session_ids: Vec<SessionId> = self.read_sessions().keys().copied().collect();

        for session_id in session_ids {
            if let Err(e) = self.close_session(&session_id).await {
                warn!("Failed to close session {}: {}", session_id, e);
            }
        }

        Ok(())
    }

    /// Get the number of tracked sessions.
    pub fn session_count(&self) -> usize {
        self.read_sessions().len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Session ID
    pub session_id: SessionId,

    /// Command line
    pub command: String,

    /// Backend supplying the byte stream
    pub backend_name: String,

    /// Session status
    pub status: SessionStatus,

    /// Creation time
    pub created_at: SystemTime,
}
