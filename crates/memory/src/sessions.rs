//! In-memory session store.

use async_trait::async_trait;
use chrono::Utc;
use lectern_core::error::StoreError;
use lectern_core::message::{Message, Session, SessionId};
use lectern_core::session::SessionStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps sessions in a map for the lifetime of the process.
///
/// Every read hands out a clone, so a run can never mutate stored history
/// except through [`SessionStore::set_messages`].
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, id: &SessionId) -> Result<(Session, bool), StoreError> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(id) {
            return Ok((session.clone(), false));
        }
        let session = Session::new(id.clone());
        sessions.insert(id.clone(), session.clone());
        Ok((session, true))
    }

    async fn get(&self, id: &SessionId) -> Result<Session, StoreError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))
    }

    async fn set_messages(&self, id: &SessionId, messages: Vec<Message>) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))?;
        session.messages = messages;
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<Session> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }
}
