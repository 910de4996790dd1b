//! Contact list construction.
//!
//! The directory snapshot is joined with the newest message of every
//! conversation the session user shares with each other user. Lookups fan
//! out concurrently (capped by `ClientConfig::lookup_concurrency`) and the
//! result is sorted only once every lookup has settled.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

use chatline_types::backend::{ConversationStore, UserDirectory};
use chatline_types::{Contact, Message, User};

use crate::config::ClientConfig;
use crate::conversation::ConversationScheme;
use crate::error::ClientError;

pub struct ContactAggregator {
    directory: Arc<dyn UserDirectory>,
    conversations: Arc<dyn ConversationStore>,
    scheme: ConversationScheme,
    max_in_flight: usize,
}

impl ContactAggregator {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        conversations: Arc<dyn ConversationStore>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            directory,
            conversations,
            scheme: config.conversation_scheme,
            max_in_flight: config.lookup_limit(),
        }
    }

    /// Build the ordered contact list for `session_user_id`.
    ///
    /// Fails only when the directory itself cannot be enumerated; a failed
    /// last-message lookup yields that contact without a preview.
    pub async fn aggregate(&self, session_user_id: &str) -> Result<Vec<Contact>, ClientError> {
        if session_user_id.is_empty() {
            return Err(ClientError::InvalidParticipant);
        }

        let users = self.directory.fetch_all().await.map_err(|e| {
            warn!(error = %e, "Directory fetch failed");
            ClientError::DirectoryUnavailable(e)
        })?;
        let directory_size = users.len();

        let mut contacts: Vec<Contact> = stream::iter(users)
            .filter(|user| std::future::ready(user.id != session_user_id))
            .map(|user| self.resolve(session_user_id, user))
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        sort_contacts(&mut contacts);

        debug!(
            directory_size,
            contacts = contacts.len(),
            "Contact aggregation complete"
        );
        Ok(contacts)
    }

    async fn resolve(&self, session_user_id: &str, user: User) -> Contact {
        match self.last_message(session_user_id, &user.id).await {
            Ok(last) => Contact::from_user(user, last.as_ref()),
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Showing contact without preview");
                Contact::from_user(user, None)
            }
        }
    }

    async fn last_message(
        &self,
        session_user_id: &str,
        user_id: &str,
    ) -> Result<Option<Message>, ClientError> {
        let conversation = self.scheme.derive(session_user_id, user_id)?;

        let latest = self
            .conversations
            .latest(&conversation, 1)
            .await
            .map_err(|source| ClientError::LastMessageLookupFailed {
                user_id: user_id.to_string(),
                source,
            })?;

        Ok(latest.into_iter().next())
    }
}

/// Case-insensitive by name; exact name then id settle ties so the order
/// never depends on lookup completion order.
fn sort_contacts(contacts: &mut [Contact]) {
    contacts.sort_by_cached_key(|c| (c.name.to_lowercase(), c.name.clone(), c.id.clone()));
}

/// The rendered contact list. A failed refresh leaves the previous list
/// in place.
#[derive(Debug, Default)]
pub struct ContactBook {
    contacts: Vec<Contact>,
}

impl ContactBook {
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn find(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
    }

    pub async fn refresh(
        &mut self,
        aggregator: &ContactAggregator,
        session_user_id: &str,
    ) -> Result<&[Contact], ClientError> {
        let fresh = aggregator.aggregate(session_user_id).await?;
        self.contacts = fresh;
        Ok(&self.contacts)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::conversation::derive_id;
    use crate::testing::{MemoryBackend, at, user};

    fn aggregator(backend: &Arc<MemoryBackend>, config: &ClientConfig) -> ContactAggregator {
        ContactAggregator::new(backend.clone(), backend.clone(), config)
    }

    fn names(contacts: &[Contact]) -> Vec<&str> {
        contacts.iter().map(|c| c.name.as_str()).collect()
    }

    #[tokio::test]
    async fn excludes_session_user() {
        let backend = Arc::new(MemoryBackend::new(vec![user("u1", "Bob"), user("u2", "Alice")]));
        let contacts = aggregator(&backend, &ClientConfig::default())
            .aggregate("u1")
            .await
            .unwrap();

        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].id, "u2");
        assert_eq!(contacts[0].name, "Alice");
        assert!(contacts[0].last_message.is_none());
    }

    #[tokio::test]
    async fn attaches_last_message() {
        let backend = Arc::new(MemoryBackend::new(vec![user("u1", "Bob"), user("u2", "Alice")]));
        let cid = derive_id("u1", "u2").unwrap();
        backend.seed(&cid, "u2", "older", at(0));
        backend.seed(&cid, "u2", "hi", at(10));

        let contacts = aggregator(&backend, &ClientConfig::default())
            .aggregate("u1")
            .await
            .unwrap();

        assert_eq!(contacts[0].last_message.as_deref(), Some("hi"));
        assert_eq!(contacts[0].last_message_at, Some(at(10)));
    }

    #[tokio::test]
    async fn orders_by_name_regardless_of_input_order() {
        for users in [
            vec![user("u3", "Carol"), user("u2", "Alice")],
            vec![user("u2", "Alice"), user("u3", "Carol")],
        ] {
            let backend = Arc::new(MemoryBackend::new(users));
            let contacts = aggregator(&backend, &ClientConfig::default())
                .aggregate("u1")
                .await
                .unwrap();
            assert_eq!(names(&contacts), ["Alice", "Carol"]);
        }
    }

    #[tokio::test]
    async fn ordering_ignores_case_and_breaks_ties() {
        let backend = Arc::new(MemoryBackend::new(vec![
            user("u5", "bob"),
            user("u4", "Bob"),
            user("u3", "alice"),
            user("u2", "Bob"),
        ]));
        let contacts = aggregator(&backend, &ClientConfig::default())
            .aggregate("u1")
            .await
            .unwrap();

        let ids: Vec<&str> = contacts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["u3", "u2", "u4", "u5"]);
    }

    #[tokio::test]
    async fn repeated_runs_are_identical() {
        let backend = Arc::new(MemoryBackend::new(
            (0..20).map(|i| user(&format!("u{i:02}"), &format!("User {}", i % 7))).collect(),
        ));
        backend.seed(&derive_id("u00", "u05").unwrap(), "u05", "yo", at(3));
        let aggregator = aggregator(&backend, &ClientConfig::default());

        let first = aggregator.aggregate("u00").await.unwrap();
        let second = aggregator.aggregate("u00").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn failed_lookup_keeps_contact() {
        let backend = Arc::new(MemoryBackend::new(vec![
            user("u1", "Bob"),
            user("u2", "Alice"),
            user("u3", "Carol"),
        ]));
        let failing = derive_id("u1", "u2").unwrap();
        backend.seed(&failing, "u2", "lost", at(1));
        backend.fail_lookup(&failing);
        backend.seed(&derive_id("u1", "u3").unwrap(), "u3", "hey", at(2));

        let contacts = aggregator(&backend, &ClientConfig::default())
            .aggregate("u1")
            .await
            .unwrap();

        assert_eq!(names(&contacts), ["Alice", "Carol"]);
        assert!(contacts[0].last_message.is_none());
        assert_eq!(contacts[1].last_message.as_deref(), Some("hey"));
    }

    #[tokio::test]
    async fn directory_failure_is_reported() {
        let backend = Arc::new(MemoryBackend::new(vec![user("u2", "Alice")]));
        backend.directory_down.store(true, Ordering::SeqCst);

        let err = aggregator(&backend, &ClientConfig::default())
            .aggregate("u1")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::DirectoryUnavailable(_)));
    }

    #[tokio::test]
    async fn lookups_respect_concurrency_cap() {
        let backend = Arc::new(MemoryBackend::new(
            (0..12).map(|i| user(&format!("u{i}"), &format!("User {i}"))).collect(),
        ));
        let config = ClientConfig {
            lookup_concurrency: 3,
            ..ClientConfig::default()
        };

        let contacts = aggregator(&backend, &config).aggregate("u0").await.unwrap();
        assert_eq!(contacts.len(), 11);

        let peak = backend.peak_in_flight.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= 3, "peak in-flight lookups was {peak}");
    }

    #[tokio::test]
    async fn empty_session_id_is_rejected() {
        let backend = Arc::new(MemoryBackend::new(vec![user("u2", "Alice")]));
        let err = aggregator(&backend, &ClientConfig::default())
            .aggregate("")
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::InvalidParticipant);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_list() {
        let backend = Arc::new(MemoryBackend::new(vec![user("u1", "Bob"), user("u2", "Alice")]));
        let aggregator = aggregator(&backend, &ClientConfig::default());
        let mut book = ContactBook::default();

        book.refresh(&aggregator, "u1").await.unwrap();
        let before = book.contacts().to_vec();

        backend.directory_down.store(true, Ordering::SeqCst);
        assert!(book.refresh(&aggregator, "u1").await.is_err());
        assert_eq!(book.contacts(), before.as_slice());
        assert!(book.find("u2").is_some());
    }
}
