pub mod backend;
pub mod error;
pub mod events;
pub mod models;

pub use error::{AuthError, StoreError};
pub use models::{Contact, ConversationId, Message, Session, User};
