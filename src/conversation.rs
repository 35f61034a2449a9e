use crate::models::{Message, Role};

pub const GREETING: &str = "Hello! Upload a PDF to the knowledge base, then ask me anything about it.";

/// Append-only record of the session's exchange.
///
/// The first entry is always the assistant greeting. Entries are never edited,
/// removed or reordered.
#[derive(Clone, Debug)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    /// Creates a log holding only the greeting.
    pub fn seeded() -> Self {
        Self {
            messages: vec![Message::assistant(GREETING)],
        }
    }

    pub fn append(&mut self, message: Message) -> &Message {
        log::debug!("Appending {:?} message ({} chars)", message.role, message.text.len());
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    // Never true: the greeting cannot be removed
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> &Message {
        &self.messages[self.messages.len() - 1]
    }

    pub fn count_by(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::seeded()
    }
}
