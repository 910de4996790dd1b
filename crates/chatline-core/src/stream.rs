//! Live view of one conversation log.
//!
//! A [`Subscription`] delivers the complete ordered message list after
//! every change to its conversation. Ordering comes from the backend
//! (server timestamp, then arrival order); nothing here re-sorts.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatline_types::backend::ConversationStore;
use chatline_types::events::StoreEvent;
use chatline_types::{ConversationId, Message};

use crate::error::{ClientError, SendError};

#[derive(Clone)]
pub struct MessageStream {
    conversations: Arc<dyn ConversationStore>,
}

impl MessageStream {
    pub fn new(conversations: Arc<dyn ConversationStore>) -> Self {
        Self { conversations }
    }

    /// Start following `conversation_id`. The current log is available
    /// from the returned subscription immediately.
    pub async fn subscribe(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Subscription, ClientError> {
        // Listen before reading so no append falls between the two
        let feed = self.conversations.watch();

        let initial = self
            .conversations
            .ordered(&conversation_id)
            .await
            .map_err(ClientError::Subscription)?;

        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive, cannot fail
        let _ = tx.send(initial);

        let token = CancellationToken::new();
        let task = tokio::spawn(follow(
            self.conversations.clone(),
            conversation_id.clone(),
            feed,
            tx,
            token.clone(),
        ));

        info!(conversation = %conversation_id, "Subscribed to conversation");
        Ok(Subscription {
            conversation_id,
            snapshots: rx,
            token,
            task: Some(task),
        })
    }

    /// Append `text` as `sender_id`. Blank text is ignored and returns
    /// `Ok(None)` without touching the backend.
    pub async fn send(
        &self,
        conversation_id: &ConversationId,
        sender_id: &str,
        text: &str,
    ) -> Result<Option<Message>, SendError> {
        if text.trim().is_empty() {
            debug!("Ignoring empty message");
            return Ok(None);
        }

        match self.conversations.append(conversation_id, sender_id, text).await {
            Ok(message) => {
                debug!(conversation = %conversation_id, message_id = %message.id, "Message sent");
                Ok(Some(message))
            }
            Err(source) => {
                warn!(conversation = %conversation_id, error = %source, "Message send failed");
                Err(SendError {
                    text: text.to_string(),
                    source,
                })
            }
        }
    }
}

async fn follow(
    conversations: Arc<dyn ConversationStore>,
    conversation_id: ConversationId,
    mut feed: broadcast::Receiver<StoreEvent>,
    tx: mpsc::UnboundedSender<Vec<Message>>,
    token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = feed.recv() => event,
        };

        match event {
            Ok(event) if event.conversation_id() == &conversation_id => {}
            Ok(_) => continue,
            Err(RecvError::Lagged(n)) => {
                warn!(conversation = %conversation_id, "Feed lagged by {} events, resyncing", n);
            }
            Err(RecvError::Closed) => {
                debug!(conversation = %conversation_id, "Change feed closed");
                break;
            }
        }

        match conversations.ordered(&conversation_id).await {
            Ok(messages) => {
                if token.is_cancelled() || tx.send(messages).is_err() {
                    break;
                }
            }
            // The next change retries the read
            Err(e) => {
                warn!(conversation = %conversation_id, error = %e, "Conversation refresh failed");
            }
        }
    }
}

/// Handle to a live conversation listener. Dropping it cancels.
pub struct Subscription {
    conversation_id: ConversationId,
    snapshots: mpsc::UnboundedReceiver<Vec<Message>>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the next full snapshot. `None` once cancelled or once the
    /// listener has stopped.
    pub async fn next(&mut self) -> Option<Vec<Message>> {
        if self.token.is_cancelled() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            snapshot = self.snapshots.recv() => snapshot,
        }
    }

    /// Stop delivery. Idempotent; nothing is delivered after this returns,
    /// including snapshots already queued.
    pub fn cancel(&mut self) {
        if self.token.is_cancelled() {
            return;
        }

        self.token.cancel();
        self.snapshots.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        info!(conversation = %self.conversation_id, "Unsubscribed from conversation");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Holds at most one subscription. Installing a new one cancels the old.
#[derive(Default)]
pub struct SubscriptionSlot {
    active: Option<Subscription>,
}

impl SubscriptionSlot {
    pub fn replace(&mut self, next: Subscription) {
        self.clear();
        self.active = Some(next);
    }

    /// Cancel the active subscription. Returns whether there was one.
    pub fn clear(&mut self) -> bool {
        match self.active.take() {
            Some(mut subscription) => {
                subscription.cancel();
                true
            }
            None => false,
        }
    }

    pub fn active(&self) -> Option<&Subscription> {
        self.active.as_ref()
    }

    /// Next snapshot of the active subscription. Pends forever while the
    /// slot is empty, so it can sit in a `select!` next to user input.
    pub async fn next(&mut self) -> Option<Vec<Message>> {
        let Some(subscription) = self.active.as_mut() else {
            return std::future::pending().await;
        };

        let snapshot = subscription.next().await;
        if snapshot.is_none() {
            self.active = None;
        }
        snapshot
    }
}
