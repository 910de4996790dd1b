use std::sync::Arc;

use tracing::{debug, info, warn};

use chatline_types::backend::IdentityProvider;
use chatline_types::{AuthError, Session};

/// Wraps the identity provider and tracks the current session.
///
/// A failed sign-in or sign-up leaves the current session untouched, and
/// so does a failed sign-out.
pub struct IdentityGateway {
    provider: Arc<dyn IdentityProvider>,
    session: Option<Session>,
}

impl IdentityGateway {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            session: None,
        }
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<&Session, AuthError> {
        let session = self.provider.sign_in(email, password).await.map_err(|e| {
            warn!(error = %e, "Sign-in failed");
            e
        })?;

        debug!(user_id = %session.user_id, "Session established");
        Ok(self.session.insert(session))
    }

    pub async fn sign_up(&mut self, email: &str, password: &str) -> Result<&Session, AuthError> {
        let session = self.provider.sign_up(email, password).await.map_err(|e| {
            warn!(error = %e, "Sign-up failed");
            e
        })?;

        debug!(user_id = %session.user_id, "Session established for new account");
        Ok(self.session.insert(session))
    }

    /// Resume a persisted session token.
    pub async fn restore(&mut self, token: &str) -> Result<&Session, AuthError> {
        let session = self.provider.restore(token).await?;
        info!(user_id = %session.user_id, "Session restored");
        Ok(self.session.insert(session))
    }

    /// Sign out of the current session. Returns `Ok(false)` when nobody was
    /// signed in.
    pub async fn sign_out(&mut self) -> Result<bool, AuthError> {
        let Some(session) = self.session.as_ref() else {
            return Ok(false);
        };

        if let Err(e) = self.provider.sign_out(session).await {
            warn!(error = %e, "Sign-out failed, keeping session");
            return Err(e);
        }

        info!(user_id = %session.user_id, "Signed out");
        self.session = None;
        Ok(true)
    }
}
