//! Session store trait.
//!
//! The store owns sessions. A run reads a copy once at start and writes the
//! final message list back once at the end.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{Message, Session, SessionId};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session, creating an empty one when absent. The flag is `true` on creation.
    async fn get_or_create(&self, id: &SessionId) -> Result<(Session, bool), StoreError>;

    /// Direct lookup. `NotFound` when absent.
    async fn get(&self, id: &SessionId) -> Result<Session, StoreError>;

    /// Replace the full message list of a session in one step.
    async fn set_messages(&self, id: &SessionId, messages: Vec<Message>) -> Result<(), StoreError>;

    /// All sessions, oldest first.
    async fn list(&self) -> Result<Vec<Session>, StoreError>;
}
