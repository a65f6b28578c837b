use crate::conversation::{MessageId, MessageStore};
use crate::session::{SessionId, SessionRegistry};

/// Owns all client-side chat state: the session registry and the
/// messages of the current session
#[derive(Debug, Default)]
pub struct ChatState {
    pub registry: SessionRegistry,
    pub store: MessageStore,
    /// Monotonic, never reset when the store is replaced
    next_message_id: u64,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_message_id(&mut self) -> MessageId {
        let id = MessageId(self.next_message_id);
        self.next_message_id += 1;
        id
    }

    pub fn current_session(&self) -> Option<&SessionId> {
        self.registry.current()
    }

    /// Whether `session` is current and the store already shows it
    pub fn is_displaying(&self, session: &SessionId) -> bool {
        self.registry.is_current(session) && self.store.is_scoped_to(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_are_unique_and_increasing() {
        let mut state = ChatState::new();
        let first = state.next_message_id();
        let second = state.next_message_id();
        state.store.replace_all(None, Vec::new());
        let third = state.next_message_id();

        assert!(first < second && second < third);
    }

    #[test]
    fn test_is_displaying_requires_current_and_scope() {
        let mut state = ChatState::new();
        let a = SessionId::new("a").unwrap();
        state.registry.insert(a.clone());
        assert!(!state.is_displaying(&a));

        state.store.replace_all(Some(a.clone()), Vec::new());
        assert!(state.is_displaying(&a));
    }
}
