use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-side session identifier. Opaque and never empty; the bytes the
/// server hands out are kept exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(ChatError::InvalidSessionId(
                "session id must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Session id typed by the user: surrounding whitespace is dropped and a
    /// blank id is rejected
    pub fn from_input(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ChatError::InvalidSessionId(
                "session id must not be blank".to_string(),
            ));
        }
        Self::new(trimmed)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = ChatError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Known sessions in discovery order plus the current one.
///
/// Every mutation keeps two invariants: no duplicate ids, and a non-empty
/// registry always has a `current` that is one of its members.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Vec<SessionId>,
    current: Option<SessionId>,
}

impl SessionRegistry {
    pub fn sessions(&self) -> &[SessionId] {
        &self.sessions
    }

    pub fn current(&self) -> Option<&SessionId> {
        self.current.as_ref()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains(id)
    }

    pub fn is_current(&self, id: &SessionId) -> bool {
        self.current.as_ref() == Some(id)
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Append a session unless it is already known. A registry without a
    /// current session adopts the inserted one.
    pub fn insert(&mut self, id: SessionId) {
        if !self.contains(&id) {
            self.sessions.push(id.clone());
        }
        if self.current.is_none() {
            self.current = Some(id);
        }
    }

    pub fn set_current(&mut self, id: &SessionId) -> Result<()> {
        if !self.contains(id) {
            return Err(ChatError::UnknownSession(id.to_string()));
        }
        self.current = Some(id.clone());
        Ok(())
    }

    /// Remove a session. When it was current, the first remaining session
    /// takes over; an emptied registry has no current session.
    pub fn remove(&mut self, id: &SessionId) -> bool {
        let Some(pos) = self.sessions.iter().position(|s| s == id) else {
            return false;
        };
        self.sessions.remove(pos);

        if self.is_current(id) {
            self.current = self.sessions.first().cloned();
        }
        true
    }

    /// Replace `old` in place with `new`, dropping any other entry already
    /// named `new`.
    pub fn rename(&mut self, old: &SessionId, new: &SessionId) {
        if old == new {
            return;
        }

        self.sessions.retain(|s| s != new);
        match self.sessions.iter_mut().find(|s| *s == old) {
            Some(slot) => *slot = new.clone(),
            None => self.sessions.push(new.clone()),
        }

        let current_was_new = self.is_current(new);
        if self.is_current(old) || current_was_new {
            self.current = Some(new.clone());
        }
    }

    /// Install an authoritative list. Duplicates are dropped keeping the
    /// first occurrence; `current` survives if still listed, otherwise it
    /// moves to the first session.
    pub fn replace_all(&mut self, sessions: Vec<SessionId>) {
        let mut deduped: Vec<SessionId> = Vec::with_capacity(sessions.len());
        for id in sessions {
            if !deduped.contains(&id) {
                deduped.push(id);
            }
        }
        self.sessions = deduped;

        let keep_current = self
            .current
            .as_ref()
            .is_some_and(|c| self.sessions.contains(c));
        if !keep_current {
            self.current = self.sessions.first().cloned();
        }
    }

    #[cfg(test)]
    pub fn check_invariants(&self) {
        for (i, id) in self.sessions.iter().enumerate() {
            assert!(
                !self.sessions[i + 1..].contains(id),
                "duplicate session {} in {:?}",
                id,
                self.sessions
            );
        }
        if !self.sessions.is_empty() {
            let current = self.current.as_ref().expect("non-empty registry without current");
            assert!(self.sessions.contains(current), "current {} not listed", current);
        } else {
            assert!(self.current.is_none(), "empty registry with a current session");
        }
    }
}
