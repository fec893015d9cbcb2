// src/core/transcript.rs — Append-only conversation history for the root model

use crate::provider::Message;

/// Messages exchanged with the root model during one call. Entries are only
/// ever appended.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Transcript plus one transient trailing message.
    pub fn with_instruction(&self, instruction: impl Into<String>) -> Vec<Message> {
        let mut request = Vec::with_capacity(self.messages.len() + 1);
        request.extend(self.messages.iter().cloned());
        request.push(Message::user(instruction));
        request
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
