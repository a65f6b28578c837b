use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Correlation key for a message. Only used to find a message again,
/// display order is insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub pending: bool,
}

impl Message {
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            pending: false,
        }
    }

    pub fn assistant(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: content.into(),
            pending: false,
        }
    }

    /// Empty assistant message waiting for streamed content
    pub fn placeholder(id: MessageId) -> Self {
        Self {
            pending: true,
            ..Self::assistant(id, String::new())
        }
    }
}

/// Messages of the session currently on screen, in display order.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    session: Option<SessionId>,
    messages: Vec<Message>,
}

impl MessageStore {
    /// The session these messages belong to
    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    pub fn is_scoped_to(&self, session: &SessionId) -> bool {
        self.session.as_ref() == Some(session)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn has_pending(&self) -> bool {
        self.messages.iter().any(|m| m.pending)
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Apply `update` to the message with `id`. Returns false when no such
    /// message exists, e.g. a late stream update after a session switch.
    pub fn update_by_id<F>(&mut self, id: MessageId, update: F) -> bool
    where
        F: FnOnce(&mut Message),
    {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                update(message);
                true
            }
            None => false,
        }
    }

    /// Discard everything and take over `messages` for `session`
    pub fn replace_all(&mut self, session: Option<SessionId>, messages: Vec<Message>) {
        self.session = session;
        self.messages = messages;
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
