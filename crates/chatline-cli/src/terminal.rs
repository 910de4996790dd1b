//! Line-oriented terminal front end: command parsing and rendering.

use std::io::Write;

use chrono::{DateTime, Local, Utc};
use tracing::warn;

use chatline_core::Presenter;
use chatline_types::events::Intent;
use chatline_types::{Contact, ConversationId, Message};

const PREVIEW_CHARS: usize = 40;

pub const HELP: &str = "\
Commands:
  login <email> <password>
  register <name> <email> <password> <confirm>
  contacts                 refresh the contact list
  open <number|contact-id> open a conversation
  close                    leave the conversation
  logout
  quit
Any other line is sent as a message while a conversation is open.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Intent(Intent),
    /// Contact list number (1-based) or contact id
    Open(String),
    Help,
    Quit,
}

/// Parse one input line. `Ok(None)` for blank lines; `Err` carries a
/// usage hint. Inside a conversation only exact command forms are
/// commands, anything else is sent as text.
pub fn parse(line: &str, in_conversation: bool) -> Result<Option<Command>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let mut words = trimmed.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let command = match (verb, args.as_slice()) {
        ("login", [email, password]) => Command::Intent(Intent::SignIn {
            email: email.to_string(),
            password: password.to_string(),
        }),
        ("register", [name, email, password, confirm]) => Command::Intent(Intent::SignUp {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }),
        ("logout", []) => Command::Intent(Intent::SignOut),
        ("contacts", []) => Command::Intent(Intent::RefreshContacts),
        ("open", [target]) => Command::Open(target.to_string()),
        ("close", []) => Command::Intent(Intent::CloseConversation),
        ("help", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        _ if in_conversation => Command::Intent(Intent::SendMessage {
            text: line.trim_end_matches(['\r', '\n']).to_string(),
        }),
        ("login", _) => return Err("usage: login <email> <password>".into()),
        ("register", _) => {
            return Err("usage: register <name> <email> <password> <confirm>".into());
        }
        ("open", _) => return Err("usage: open <number|contact-id>".into()),
        _ => return Err(format!("unknown command '{verb}', try 'help'")),
    };

    Ok(Some(command))
}

/// Resolve an `open` argument: a 1-based list number when in range,
/// otherwise the argument is taken as a contact id.
pub fn resolve_contact(target: &str, contacts: &[Contact]) -> String {
    target
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| contacts.get(i))
        .map(|c| c.id.clone())
        .unwrap_or_else(|| target.to_string())
}

fn short_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn preview(text: &str) -> String {
    let single_line = text.replace(['\r', '\n'], " ");
    if single_line.chars().count() <= PREVIEW_CHARS {
        return single_line;
    }
    let cut: String = single_line.chars().take(PREVIEW_CHARS - 3).collect();
    format!("{cut}...")
}

pub fn contact_row(number: usize, contact: &Contact) -> String {
    let last = contact
        .last_message
        .as_deref()
        .map(preview)
        .unwrap_or_else(|| "No messages yet".into());
    let when = contact.last_message_at.map(short_time).unwrap_or_default();

    format!("{number:>3}. {:<20} {last:<42} {when}", contact.name)
        .trim_end()
        .to_string()
}

pub struct TerminalPresenter<W> {
    out: W,
    partner: Option<Contact>,
}

impl<W: Write + Send> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out, partner: None }
    }

    pub fn show_help(&mut self) {
        self.emit(HELP.to_string());
    }

    pub fn show_usage(&mut self, usage: &str) {
        self.emit(usage.to_string());
    }

    fn emit(&mut self, text: String) {
        let result = writeln!(self.out, "{text}").and_then(|_| self.out.flush());
        if let Err(e) = result {
            warn!(error = %e, "Failed to write to terminal");
        }
    }

    fn sender_name<'a>(&'a self, message: &Message) -> &'a str {
        match &self.partner {
            Some(partner) if partner.id == message.sender_id => &partner.name,
            _ => "You",
        }
    }
}

impl<W: Write + Send> Presenter for TerminalPresenter<W> {
    fn show_sign_in(&mut self) {
        self.partner = None;
        self.emit(
            "Not signed in. Use 'login <email> <password>' or \
             'register <name> <email> <password> <confirm>'."
                .into(),
        );
    }

    fn show_contacts(&mut self, contacts: &[Contact]) {
        if contacts.is_empty() {
            self.emit("No contacts yet.".into());
            return;
        }

        let rows: Vec<String> = contacts
            .iter()
            .enumerate()
            .map(|(i, contact)| contact_row(i + 1, contact))
            .collect();
        self.emit(format!("Contacts:\n{}", rows.join("\n")));
    }

    fn show_conversation(&mut self, contact: &Contact) {
        self.emit(format!(
            "Conversation with {} <{}>. Type to send, 'close' to go back.",
            contact.name, contact.email
        ));
        self.partner = Some(contact.clone());
    }

    fn show_messages(&mut self, _conversation_id: &ConversationId, messages: &[Message]) {
        let mut screen = String::from("----");
        for message in messages {
            screen.push_str(&format!(
                "\n[{}] {}: {}",
                short_time(message.timestamp),
                self.sender_name(message),
                message.text
            ));
        }
        if messages.is_empty() {
            screen.push_str("\nNo messages yet. Say hello!");
        }
        self.emit(screen);
    }

    fn show_error(&mut self, title: &str, message: &str) {
        self.emit(format!("{title}: {message}"));
    }
}
