//! Client-side chat logic: conversation identity, contact aggregation,
//! live message streams and the intent-handling controller.
//!
//! Everything here talks to the backend through the capability traits in
//! `chatline_types::backend`, injected at construction time.

pub mod aggregator;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod presenter;
pub mod stream;

#[cfg(test)]
mod testing;

pub use aggregator::{ContactAggregator, ContactBook};
pub use config::ClientConfig;
pub use controller::{ChatController, IntentHandler};
pub use conversation::{ConversationScheme, derive_id};
pub use error::{ClientError, SendError};
pub use gateway::IdentityGateway;
pub use presenter::Presenter;
pub use stream::{MessageStream, Subscription, SubscriptionSlot};
