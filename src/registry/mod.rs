use crate::core::{CorrelationId, GatewayError, Result};
use crate::session::SessionHandle;
use log::warn;
use std::collections::HashMap;
use std::sync::RwLock;

/// Process-wide table of in-flight aggregation sessions
///
/// The only shared mutable state in the engine. Maps a command's
/// correlation id to the handle of its session task; entries are added
/// at dispatch and removed exactly once, by the session runner on
/// finalization (or via [`drain`] on shutdown).
///
/// Deliberately an explicit, injectable object rather than a global
/// singleton, so tests and embedders can run isolated instances.
///
/// [`drain`]: CorrelationRegistry::drain
#[derive(Debug, Default)]
pub struct CorrelationRegistry {
    sessions: RwLock<HashMap<CorrelationId, SessionHandle>>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for a correlation id
    ///
    /// A duplicate registration is a protocol violation: it must never
    /// happen in correct operation and is returned as an error rather
    /// than retried or overwritten.
    pub fn register(&self, correlation_id: CorrelationId, handle: SessionHandle) -> Result<()> {
        let mut sessions = self.sessions.write()?;
        if sessions.contains_key(&correlation_id) {
            warn!(
                "Rejecting duplicate session registration for correlation id '{}'",
                correlation_id
            );
            return Err(GatewayError::DuplicateCorrelation(
                correlation_id.to_string(),
            ));
        }
        sessions.insert(correlation_id, handle);
        Ok(())
    }

    /// Look up the in-flight session for a correlation id
    pub fn lookup(&self, correlation_id: &CorrelationId) -> Option<SessionHandle> {
        self.sessions
            .read()
            .ok()?
            .get(correlation_id)
            .cloned()
    }

    /// Remove a session; returns the handle if one was registered
    pub fn remove(&self, correlation_id: &CorrelationId) -> Option<SessionHandle> {
        self.sessions.write().ok()?.remove(correlation_id)
    }

    /// Remove and return every registered session (shutdown path)
    pub fn drain(&self) -> Vec<(CorrelationId, SessionHandle)> {
        match self.sessions.write() {
            Ok(mut sessions) => sessions.drain().collect(),
            Err(err) => {
                warn!("Correlation registry lock poisoned during drain: {}", err);
                Vec::new()
            }
        }
    }

    /// Number of in-flight sessions
    pub fn len(&self) -> usize {
        self.sessions.read().map(|sessions| sessions.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
