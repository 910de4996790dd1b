use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, error};
use uuid::Uuid;

use chatline_types::backend::{ConversationStore, UserDirectory};
use chatline_types::events::StoreEvent;
use chatline_types::{ConversationId, Message, StoreError, User};

use crate::Database;
use crate::feed::ChangeFeed;
use crate::models::{MessageRow, UserRow};

/// SQLite implementation of the directory and conversation backends.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
    feed: ChangeFeed,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            feed: ChangeFeed::new(),
        }
    }

    /// Run blocking DB work off the async runtime
    async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                StoreError::Unavailable(e.to_string())
            })?
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn fetch_all(&self) -> Result<Vec<User>, StoreError> {
        let rows = self.blocking(|db| db.list_users()).await?;
        debug!(count = rows.len(), "Fetched directory");
        Ok(rows.into_iter().map(user_from_row).collect())
    }

    async fn fetch(&self, id: &str) -> Result<Option<User>, StoreError> {
        let id = id.to_string();
        let row = self.blocking(move |db| db.get_user(&id)).await?;
        Ok(row.map(user_from_row))
    }

    async fn register(&self, user: &User) -> Result<(), StoreError> {
        let record = user.clone();
        self.blocking(move |db| db.put_user(&record.id, &record.name, &record.email))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn append(
        &self,
        conversation: &ConversationId,
        sender_id: &str,
        text: &str,
    ) -> Result<Message, StoreError> {
        let id = Uuid::new_v4().to_string();
        let cid = conversation.to_string();
        let sender = sender_id.to_string();
        let body = text.to_string();

        let row = self
            .blocking(move |db| db.insert_message(&id, &cid, &sender, &body))
            .await?;
        let message = message_from_row(row)?;

        self.feed.publish(StoreEvent::MessageAppended {
            conversation_id: conversation.clone(),
            message: message.clone(),
        });
        Ok(message)
    }

    async fn latest(
        &self,
        conversation: &ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError> {
        let cid = conversation.to_string();
        let rows = self
            .blocking(move |db| db.latest_messages(&cid, limit))
            .await?;
        rows.into_iter().map(message_from_row).collect()
    }

    async fn ordered(&self, conversation: &ConversationId) -> Result<Vec<Message>, StoreError> {
        let cid = conversation.to_string();
        let rows = self
            .blocking(move |db| db.conversation_messages(&cid))
            .await?;
        rows.into_iter().map(message_from_row).collect()
    }

    fn watch(&self) -> broadcast::Receiver<StoreEvent> {
        self.feed.subscribe()
    }
}

fn user_from_row(row: UserRow) -> User {
    User {
        id: row.id,
        name: row.name,
        email: row.email,
    }
}

fn message_from_row(row: MessageRow) -> Result<Message, StoreError> {
    let timestamp = parse_timestamp(&row.created_at).ok_or_else(|| {
        StoreError::Corrupt(format!(
            "created_at '{}' on message '{}' in '{}'",
            row.created_at, row.id, row.conversation_id
        ))
    })?;

    Ok(Message {
        id: row.id,
        sender_id: row.sender_id,
        text: row.text,
        timestamp,
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written with datetime('now') carry no timezone; they are UTC.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .ok()
}
