//! Append-only agent transcript.
//!
//! `Memory` is the ordered record of everything exchanged during an agent's
//! lifetime. It exposes no way to edit or remove a message: every reader
//! (reasoning strategies, the stuck detector, flows) sees a prefix of what
//! any later reader will see.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::MemoryError;
use crate::message::{Message, Role};

/// Ordered, append-only sequence of [`Message`]s.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Message>", into = "Vec<Message>")]
pub struct Memory {
    messages: Vec<Message>,
    /// Tool call IDs issued by assistant messages so far.
    issued_calls: HashSet<String>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    ///
    /// A `tool_result` message must reference a tool call issued by an
    /// earlier assistant message; otherwise it is rejected and the
    /// transcript is left untouched.
    pub fn push(&mut self, message: Message) -> Result<(), MemoryError> {
        if message.role == Role::ToolResult {
            let call_id = message
                .tool_call_id
                .as_deref()
                .ok_or(MemoryError::MissingToolCallId)?;
            if !self.issued_calls.contains(call_id) {
                return Err(MemoryError::UnknownToolCall(call_id.to_string()));
            }
        }

        if message.role == Role::Assistant {
            for call in &message.tool_calls {
                self.issued_calls.insert(call.call_id.clone());
            }
        }

        self.messages.push(message);
        Ok(())
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Messages with the given role, oldest first.
    pub fn with_role(&self, role: Role) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(move |m| m.role == role)
    }

    /// Assistant messages, oldest first.
    pub fn assistant_messages(&self) -> impl Iterator<Item = &Message> {
        self.with_role(Role::Assistant)
    }

    /// Index of the most recent message with `role`.
    pub fn last_index_of(&self, role: Role) -> Option<usize> {
        self.messages.iter().rposition(|m| m.role == role)
    }

    /// Whether `call_id` was issued by an assistant message in this transcript.
    pub fn has_tool_call(&self, call_id: &str) -> bool {
        self.issued_calls.contains(call_id)
    }
}

impl TryFrom<Vec<Message>> for Memory {
    type Error = MemoryError;

    fn try_from(messages: Vec<Message>) -> Result<Self, Self::Error> {
        let mut memory = Memory::new();
        for message in messages {
            memory.push(message)?;
        }
        Ok(memory)
    }
}

impl From<Memory> for Vec<Message> {
    fn from(memory: Memory) -> Self {
        memory.messages
    }
}

impl<'a> IntoIterator for &'a Memory {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
