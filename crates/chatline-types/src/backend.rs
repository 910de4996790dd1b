//! Capability traits for the managed backend.
//!
//! The client never reaches storage or auth through globals: each component
//! receives the trait objects it needs at construction time.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::{AuthError, StoreError};
use crate::events::StoreEvent;
use crate::models::{ConversationId, Message, Session, User};

/// Opaque external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Create credentials and return a session for the new account.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError>;

    /// Rebuild a session from a token issued earlier.
    async fn restore(&self, token: &str) -> Result<Session, AuthError>;
}

/// Collection of User records keyed by identifier.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<User>, StoreError>;

    async fn fetch(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Write the directory record created alongside a new account.
    async fn register(&self, user: &User) -> Result<(), StoreError>;
}

/// Per-conversation append-only message logs.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append one record. The backend assigns the id and timestamp.
    async fn append(
        &self,
        conversation: &ConversationId,
        sender_id: &str,
        text: &str,
    ) -> Result<Message, StoreError>;

    /// Up to `limit` records, newest first.
    async fn latest(
        &self,
        conversation: &ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError>;

    /// The whole log, oldest first.
    async fn ordered(&self, conversation: &ConversationId) -> Result<Vec<Message>, StoreError>;

    /// Live feed of backend changes. Receivers filter by conversation.
    fn watch(&self) -> broadcast::Receiver<StoreEvent>;
}
