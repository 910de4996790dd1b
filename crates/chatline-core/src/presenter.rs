use chatline_types::{Contact, ConversationId, Message};

/// Rendering surface driven by [`crate::ChatController`].
///
/// Calls arrive in program order on the controller's task. Implementations
/// should not block.
pub trait Presenter: Send {
    /// Nobody is signed in.
    fn show_sign_in(&mut self);

    /// A fresh, fully ordered contact list.
    fn show_contacts(&mut self, contacts: &[Contact]);

    /// A conversation with `contact` was opened.
    fn show_conversation(&mut self, contact: &Contact);

    /// The complete ordered log of the open conversation.
    fn show_messages(&mut self, conversation_id: &ConversationId, messages: &[Message]);

    fn show_error(&mut self, title: &str, message: &str);
}
