//! At most one active run per session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lectern_config::SessionPolicy;
use lectern_core::error::{Error, Result};
use lectern_core::message::SessionId;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

/// Hands out one [`RunPermit`] per session at a time.
#[derive(Debug, Default)]
pub struct SessionGuard {
    policy: SessionPolicy,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Held for the duration of a run. Dropping it frees the session.
#[derive(Debug)]
pub struct RunPermit {
    session_id: SessionId,
    _lock: OwnedMutexGuard<()>,
}

impl RunPermit {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}

impl SessionGuard {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            policy,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    fn lock_for(&self, session_id: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Entries only referenced by the map belong to idle sessions.
        locks.retain(|id, lock| id == session_id.as_str() || Arc::strong_count(lock) > 1);
        locks
            .entry(session_id.as_str().to_string())
            .or_default()
            .clone()
    }

    /// Claim the session. `reject` fails fast with [`Error::SessionBusy`],
    /// `queue` waits for the active run to finish.
    pub async fn acquire(&self, session_id: &SessionId) -> Result<RunPermit> {
        let lock = self.lock_for(session_id);
        let guard = match self.policy {
            SessionPolicy::Reject => lock
                .try_lock_owned()
                .map_err(|_| Error::SessionBusy(session_id.to_string()))?,
            SessionPolicy::Queue => {
                debug!(session_id = %session_id, "Waiting for active run");
                lock.lock_owned().await
            }
        };
        Ok(RunPermit {
            session_id: session_id.clone(),
            _lock: guard,
        })
    }

    /// Whether a run currently holds the session.
    pub fn is_busy(&self, session_id: &SessionId) -> bool {
        let locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .get(session_id.as_str())
            .is_some_and(|lock| lock.try_lock().is_err())
    }
}
