use serde::{Deserialize, Serialize};

use crate::models::{ConversationId, Message};

/// Changes published by the backend to live listeners.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StoreEvent {
    /// A message was appended to a conversation log
    MessageAppended {
        conversation_id: ConversationId,
        message: Message,
    },
}

impl StoreEvent {
    /// Returns the conversation this event is scoped to.
    pub fn conversation_id(&self) -> &ConversationId {
        match self {
            Self::MessageAppended {
                conversation_id, ..
            } => conversation_id,
        }
    }
}

/// User intents emitted by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Intent {
    SignIn {
        email: String,
        password: String,
    },

    SignUp {
        name: String,
        email: String,
        password: String,
        confirm_password: String,
    },

    SignOut,

    /// Open the conversation with the given contact id
    SelectContact { contact_id: String },

    /// Append a message to the open conversation
    SendMessage { text: String },

    CloseConversation,

    /// Re-run the contact aggregation
    RefreshContacts,
}
