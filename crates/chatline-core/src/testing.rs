//! In-memory backend doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::broadcast;

use chatline_types::backend::{ConversationStore, IdentityProvider, UserDirectory};
use chatline_types::events::StoreEvent;
use chatline_types::{AuthError, Contact, ConversationId, Message, Session, StoreError, User};

use crate::presenter::Presenter;

pub(crate) fn user(id: &str, name: &str) -> User {
    User {
        id: id.into(),
        name: name.into(),
        email: format!("{}@example.com", id),
    }
}

pub(crate) fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(seconds)
}

pub(crate) struct MemoryBackend {
    users: Mutex<Vec<User>>,
    logs: Mutex<HashMap<ConversationId, Vec<Message>>>,
    failing_lookups: Mutex<HashSet<ConversationId>>,
    pub directory_down: AtomicBool,
    pub register_fails: AtomicBool,
    pub appends_fail: AtomicBool,
    pub append_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    next_second: AtomicUsize,
    feed: broadcast::Sender<StoreEvent>,
}

impl MemoryBackend {
    pub fn new(users: Vec<User>) -> Self {
        let (feed, _) = broadcast::channel(64);
        Self {
            users: Mutex::new(users),
            logs: Mutex::new(HashMap::new()),
            failing_lookups: Mutex::new(HashSet::new()),
            directory_down: AtomicBool::new(false),
            register_fails: AtomicBool::new(false),
            appends_fail: AtomicBool::new(false),
            append_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            next_second: AtomicUsize::new(0),
            feed,
        }
    }

    /// Seed a message with an explicit timestamp, bypassing `append`.
    pub fn seed(
        &self,
        conversation: &ConversationId,
        sender_id: &str,
        text: &str,
        timestamp: DateTime<Utc>,
    ) {
        let mut logs = self.logs.lock().unwrap();
        let log = logs.entry(conversation.clone()).or_default();
        log.push(Message {
            id: format!("seed-{}", log.len()),
            sender_id: sender_id.into(),
            text: text.into(),
            timestamp,
        });
        log.sort_by_key(|m| m.timestamp);
    }

    pub fn fail_lookup(&self, conversation: &ConversationId) {
        self.failing_lookups.lock().unwrap().insert(conversation.clone());
    }

    pub fn listeners(&self) -> usize {
        self.feed.receiver_count()
    }
}

#[async_trait]
impl UserDirectory for MemoryBackend {
    async fn fetch_all(&self) -> Result<Vec<User>, StoreError> {
        if self.directory_down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("directory offline".into()));
        }
        Ok(self.users.lock().unwrap().clone())
    }

    async fn fetch(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn register(&self, user: &User) -> Result<(), StoreError> {
        if self.register_fails.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("directory offline".into()));
        }
        let mut users = self.users.lock().unwrap();
        users.retain(|u| u.id != user.id);
        users.push(user.clone());
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for MemoryBackend {
    async fn append(
        &self,
        conversation: &ConversationId,
        sender_id: &str,
        text: &str,
    ) -> Result<Message, StoreError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        if self.appends_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("network unavailable".into()));
        }

        let second = self.next_second.fetch_add(1, Ordering::SeqCst) as i64;
        let message = {
            let mut logs = self.logs.lock().unwrap();
            let log = logs.entry(conversation.clone()).or_default();
            let message = Message {
                id: format!("m-{}-{}", conversation, log.len()),
                sender_id: sender_id.into(),
                text: text.into(),
                timestamp: at(1_000 + second),
            };
            log.push(message.clone());
            message
        };

        let _ = self.feed.send(StoreEvent::MessageAppended {
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
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_lookups.lock().unwrap().contains(conversation) {
            return Err(StoreError::Unavailable("lookup timed out".into()));
        }

        let logs = self.logs.lock().unwrap();
        Ok(logs
            .get(conversation)
            .map(|log| log.iter().rev().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn ordered(&self, conversation: &ConversationId) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .logs
            .lock()
            .unwrap()
            .get(conversation)
            .cloned()
            .unwrap_or_default())
    }

    fn watch(&self) -> broadcast::Receiver<StoreEvent> {
        self.feed.subscribe()
    }
}

/// Accepts any password equal to "password" for known emails.
pub(crate) struct StubIdentity {
    accounts: Mutex<Vec<(String, String)>>,
    pub fail_sign_out: AtomicBool,
}

impl StubIdentity {
    pub fn new(accounts: &[(&str, &str)]) -> Self {
        Self {
            accounts: Mutex::new(
                accounts
                    .iter()
                    .map(|(id, email)| (id.to_string(), email.to_string()))
                    .collect(),
            ),
            fail_sign_out: AtomicBool::new(false),
        }
    }

    fn session(id: &str, email: &str) -> Session {
        Session {
            user_id: id.into(),
            email: email.into(),
            token: format!("token-{}", id),
            expires_at: at(86_400),
        }
    }
}

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let accounts = self.accounts.lock().unwrap();
        match accounts.iter().find(|(_, e)| e == email) {
            Some((id, email)) if password == "password" => Ok(Self::session(id, email)),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn sign_up(&self, email: &str, _password: &str) -> Result<Session, AuthError> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.iter().any(|(_, e)| e == email) {
            return Err(AuthError::EmailInUse);
        }
        let id = format!("new{}", accounts.len());
        accounts.push((id.clone(), email.to_string()));
        Ok(Self::session(&id, email))
    }

    async fn sign_out(&self, _session: &Session) -> Result<(), AuthError> {
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AuthError::Provider("offline".into()));
        }
        Ok(())
    }

    async fn restore(&self, token: &str) -> Result<Session, AuthError> {
        let accounts = self.accounts.lock().unwrap();
        accounts
            .iter()
            .find(|(id, _)| token == format!("token-{}", id))
            .map(|(id, email)| Self::session(id, email))
            .ok_or(AuthError::SessionExpired)
    }
}

#[derive(Default)]
pub(crate) struct RecordingPresenter {
    pub sign_in_shown: usize,
    pub contact_lists: Vec<Vec<Contact>>,
    pub conversations: Vec<String>,
    pub snapshots: Vec<Vec<Message>>,
    pub errors: Vec<(String, String)>,
}

impl Presenter for RecordingPresenter {
    fn show_sign_in(&mut self) {
        self.sign_in_shown += 1;
    }

    fn show_contacts(&mut self, contacts: &[Contact]) {
        self.contact_lists.push(contacts.to_vec());
    }

    fn show_conversation(&mut self, contact: &Contact) {
        self.conversations.push(contact.id.clone());
    }

    fn show_messages(&mut self, _conversation_id: &ConversationId, messages: &[Message]) {
        self.snapshots.push(messages.to_vec());
    }

    fn show_error(&mut self, title: &str, message: &str) {
        self.errors.push((title.to_string(), message.to_string()));
    }
}
