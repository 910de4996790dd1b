use thiserror::Error;

use chatline_types::{AuthError, StoreError};

/// A failed append. Carries the user's text back so it can be retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Message could not be sent: {source}")]
pub struct SendError {
    pub text: String,
    #[source]
    pub source: StoreError,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Empty participant identifier handed to the conversation scheme
    #[error("Conversation participants must have non-empty identifiers")]
    InvalidParticipant,

    #[error("Contacts are unavailable right now: {0}")]
    DirectoryUnavailable(StoreError),

    /// Per-contact and non-fatal; logged, never returned from aggregation
    #[error("Last message lookup for {user_id} failed: {source}")]
    LastMessageLookupFailed {
        user_id: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Send(#[from] SendError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Account created but the directory record could not be written
    #[error("Your account was created but your profile could not be saved: {0}")]
    Registration(StoreError),

    #[error("Could not follow the conversation: {0}")]
    Subscription(StoreError),

    #[error("You are not signed in")]
    NotSignedIn,

    #[error("Unknown contact: {0}")]
    UnknownContact(String),

    #[error("No conversation is open")]
    NoOpenConversation,

    #[error("Please fill in the {0} field.")]
    MissingField(&'static str),

    #[error("Passwords do not match.")]
    PasswordMismatch,
}

impl ClientError {
    /// Alert title for the presentation layer.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Auth(_) | Self::NotSignedIn => "Authentication Error",
            Self::Registration(_) => "Database Error",
            Self::DirectoryUnavailable(_) | Self::LastMessageLookupFailed { .. } => {
                "Contacts Error"
            }
            Self::Send(_) | Self::Subscription(_) | Self::NoOpenConversation => "Message Error",
            Self::MissingField(_) | Self::PasswordMismatch => "Error",
            Self::InvalidParticipant | Self::UnknownContact(_) => "Conversation Error",
        }
    }
}
