//! Intent handling.
//!
//! [`ChatController`] owns the session, the contact list and at most one
//! live conversation subscription. Every failure is reported to the
//! presenter once and also returned to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use chatline_types::backend::{ConversationStore, IdentityProvider, UserDirectory};
use chatline_types::events::Intent;
use chatline_types::{Contact, ConversationId, Message, Session, User};

use crate::aggregator::{ContactAggregator, ContactBook};
use crate::config::ClientConfig;
use crate::conversation::ConversationScheme;
use crate::error::ClientError;
use crate::gateway::IdentityGateway;
use crate::presenter::Presenter;
use crate::stream::{MessageStream, SubscriptionSlot};

/// Inbound capability set of the presentation layer.
#[async_trait]
pub trait IntentHandler: Send {
    async fn sign_in(&mut self, email: &str, password: &str) -> Result<(), ClientError>;

    async fn sign_up(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<(), ClientError>;

    async fn sign_out(&mut self) -> Result<(), ClientError>;

    async fn select_contact(&mut self, contact_id: &str) -> Result<(), ClientError>;

    async fn send_message(&mut self, text: &str) -> Result<(), ClientError>;

    async fn close_conversation(&mut self) -> Result<(), ClientError>;

    async fn refresh_contacts(&mut self) -> Result<(), ClientError>;

    async fn dispatch(&mut self, intent: Intent) -> Result<(), ClientError> {
        match intent {
            Intent::SignIn { email, password } => self.sign_in(&email, &password).await,
            Intent::SignUp {
                name,
                email,
                password,
                confirm_password,
            } => self.sign_up(&name, &email, &password, &confirm_password).await,
            Intent::SignOut => self.sign_out().await,
            Intent::SelectContact { contact_id } => self.select_contact(&contact_id).await,
            Intent::SendMessage { text } => self.send_message(&text).await,
            Intent::CloseConversation => self.close_conversation().await,
            Intent::RefreshContacts => self.refresh_contacts().await,
        }
    }
}

struct OpenConversation {
    contact: Contact,
    id: ConversationId,
}

pub struct ChatController<P> {
    gateway: IdentityGateway,
    directory: Arc<dyn UserDirectory>,
    aggregator: ContactAggregator,
    stream: MessageStream,
    scheme: ConversationScheme,
    contacts: ContactBook,
    open: Option<OpenConversation>,
    subscription: SubscriptionSlot,
    /// Directory record of a sign-up whose registration has not landed yet
    pending_profile: Option<User>,
    presenter: P,
}

impl<P: Presenter> ChatController<P> {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        directory: Arc<dyn UserDirectory>,
        conversations: Arc<dyn ConversationStore>,
        config: &ClientConfig,
        presenter: P,
    ) -> Self {
        Self {
            gateway: IdentityGateway::new(provider),
            aggregator: ContactAggregator::new(directory.clone(), conversations.clone(), config),
            directory,
            stream: MessageStream::new(conversations),
            scheme: config.conversation_scheme,
            contacts: ContactBook::default(),
            open: None,
            subscription: SubscriptionSlot::default(),
            pending_profile: None,
            presenter,
        }
    }

    /// Resume `saved_token` if given, else show the sign-in screen.
    /// Returns whether a session is active afterwards.
    pub async fn start(&mut self, saved_token: Option<&str>) -> bool {
        let Some(token) = saved_token else {
            self.presenter.show_sign_in();
            return false;
        };

        let restored = self.gateway.restore(token).await.map(|_| ());
        match restored {
            Ok(()) => {
                // Failures are already on screen
                let _ = self.refresh_contacts().await;
                true
            }
            Err(e) => {
                info!(error = %e, "Saved session rejected");
                self.presenter.show_sign_in();
                false
            }
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.gateway.current_session()
    }

    pub fn contacts(&self) -> &[Contact] {
        self.contacts.contacts()
    }

    /// Id of the open conversation, if any.
    pub fn open_conversation(&self) -> Option<&ConversationId> {
        self.open.as_ref().map(|open| &open.id)
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    /// Wait for the next snapshot of the open conversation. Pends while no
    /// conversation is open; `None` when the subscription has ended.
    pub async fn next_snapshot(&mut self) -> Option<Vec<Message>> {
        self.subscription.next().await
    }

    pub fn render_messages(&mut self, messages: &[Message]) {
        if let Some(open) = &self.open {
            self.presenter.show_messages(&open.id, messages);
        }
    }

    fn report<T>(&mut self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(e) = &result {
            warn!(error = %e, "{}", e.title());
            self.presenter.show_error(e.title(), &e.to_string());
        }
        result
    }

    fn session_user_id(&self) -> Result<String, ClientError> {
        self.gateway
            .current_session()
            .map(|s| s.user_id.clone())
            .ok_or(ClientError::NotSignedIn)
    }

    /// Cancel the live subscription and forget the open conversation.
    /// Returns whether one was open.
    fn leave_conversation(&mut self) -> bool {
        let cancelled = self.subscription.clear();
        match self.open.take() {
            Some(open) => {
                info!(conversation = %open.id, contact = %open.contact.id, "Conversation closed");
                true
            }
            None => cancelled,
        }
    }

    /// Write the pending directory record once its account is signed in.
    async fn complete_profile(&mut self, user_id: &str) -> Result<(), ClientError> {
        let Some(user) = self.pending_profile.as_ref().filter(|u| u.id == user_id) else {
            return Ok(());
        };

        self.directory
            .register(user)
            .await
            .map_err(ClientError::Registration)?;
        debug!(user_id = %user.id, "Directory record written");
        self.pending_profile = None;
        Ok(())
    }

    async fn load_contacts(&mut self) -> Result<(), ClientError> {
        let user_id = self.session_user_id()?;
        self.complete_profile(&user_id).await?;
        let contacts = self.contacts.refresh(&self.aggregator, &user_id).await?;
        self.presenter.show_contacts(contacts);
        Ok(())
    }

    /// Reset per-user state after a new session was established.
    async fn enter_session(&mut self) -> Result<(), ClientError> {
        self.leave_conversation();
        self.contacts.clear();
        self.load_contacts().await
    }

    async fn try_sign_in(&mut self, email: &str, password: &str) -> Result<(), ClientError> {
        require("email", email)?;
        require("password", password)?;

        self.gateway.sign_in(email.trim(), password).await?;
        self.enter_session().await
    }

    async fn try_sign_up(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<(), ClientError> {
        require("name", name)?;
        require("email", email)?;
        require("password", password)?;
        require("confirm password", confirm_password)?;
        if password != confirm_password {
            return Err(ClientError::PasswordMismatch);
        }

        let session = self.gateway.sign_up(email.trim(), password).await?;
        // Kept until written, so a later sign-in or refresh can retry it
        self.pending_profile = Some(User {
            id: session.user_id.clone(),
            name: name.trim().to_string(),
            email: session.email.clone(),
        });

        self.enter_session().await
    }

    async fn try_sign_out(&mut self) -> Result<(), ClientError> {
        self.gateway.sign_out().await?;
        self.leave_conversation();
        self.contacts.clear();
        self.presenter.show_sign_in();
        Ok(())
    }

    async fn try_select_contact(&mut self, contact_id: &str) -> Result<(), ClientError> {
        let user_id = self.session_user_id()?;
        let contact = self
            .contacts
            .find(contact_id)
            .cloned()
            .ok_or_else(|| ClientError::UnknownContact(contact_id.to_string()))?;
        let id = self.scheme.derive(&user_id, &contact.id)?;

        // Only one live listener at a time
        self.leave_conversation();

        let subscription = self.stream.subscribe(id.clone()).await?;
        self.subscription.replace(subscription);

        info!(conversation = %id, contact = %contact.id, "Conversation opened");
        self.presenter.show_conversation(&contact);
        self.open = Some(OpenConversation { contact, id });
        Ok(())
    }

    async fn try_send_message(&mut self, text: &str) -> Result<(), ClientError> {
        let user_id = self.session_user_id()?;
        let open = self.open.as_ref().ok_or(ClientError::NoOpenConversation)?;

        self.stream.send(&open.id, &user_id, text).await?;
        Ok(())
    }

    async fn try_close_conversation(&mut self) -> Result<(), ClientError> {
        if !self.leave_conversation() {
            return Ok(());
        }
        // Pick up previews for anything sent while the conversation was open
        self.load_contacts().await
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        return Err(ClientError::MissingField(field));
    }
    Ok(())
}

#[async_trait]
impl<P: Presenter> IntentHandler for ChatController<P> {
    async fn sign_in(&mut self, email: &str, password: &str) -> Result<(), ClientError> {
        let result = self.try_sign_in(email, password).await;
        self.report(result)
    }

    async fn sign_up(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<(), ClientError> {
        let result = self.try_sign_up(name, email, password, confirm_password).await;
        self.report(result)
    }

    async fn sign_out(&mut self) -> Result<(), ClientError> {
        let result = self.try_sign_out().await;
        self.report(result)
    }

    async fn select_contact(&mut self, contact_id: &str) -> Result<(), ClientError> {
        let result = self.try_select_contact(contact_id).await;
        self.report(result)
    }

    async fn send_message(&mut self, text: &str) -> Result<(), ClientError> {
        let result = self.try_send_message(text).await;
        self.report(result)
    }

    async fn close_conversation(&mut self) -> Result<(), ClientError> {
        let result = self.try_close_conversation().await;
        self.report(result)
    }

    async fn refresh_contacts(&mut self) -> Result<(), ClientError> {
        let result = self.load_contacts().await;
        self.report(result)
    }
}
