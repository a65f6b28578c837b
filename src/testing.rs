//! In-memory `ChatService` used by unit tests.

use crate::api::{ChatService, ChunkStream, HistoryEntry};
use crate::error::{ChatError, Result};
use crate::session::SessionId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum ScriptedChunk {
    Text(String),
    Error(String),
    /// Stop producing chunks without ever ending the stream
    Hang,
}

pub fn text(s: &str) -> ScriptedChunk {
    ScriptedChunk::Text(s.to_string())
}

#[derive(Debug, Default)]
pub struct FakeServer {
    pub sessions: Vec<String>,
    pub histories: HashMap<String, Vec<HistoryEntry>>,
    pub replies: VecDeque<Vec<ScriptedChunk>>,
    pub fail_list: bool,
    pub fail_create: bool,
    pub fail_rename: bool,
    pub fail_delete: bool,
    pub fail_history: bool,
    pub fail_send: bool,
    pub created: u32,
    pub calls: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FakeChatService {
    server: Mutex<FakeServer>,
}

impl FakeChatService {
    pub fn with_sessions(sessions: &[&str]) -> Self {
        let service = Self::default();
        service.server().sessions = sessions.iter().map(|s| s.to_string()).collect();
        service
    }

    pub fn server(&self) -> MutexGuard<'_, FakeServer> {
        self.server.lock().unwrap()
    }

    pub fn set_history(&self, session: &str, entries: Vec<HistoryEntry>) {
        self.server().histories.insert(session.to_string(), entries);
    }

    pub fn push_reply(&self, chunks: Vec<ScriptedChunk>) {
        self.server().replies.push_back(chunks);
    }

    pub fn calls(&self) -> Vec<String> {
        self.server().calls.clone()
    }
}

fn failure(operation: &str) -> ChatError {
    ChatError::Api(format!("{} failed with status 500 Internal Server Error", operation))
}

impl ChatService for FakeChatService {
    async fn list_sessions(&self) -> Result<Vec<SessionId>> {
        let mut server = self.server();
        server.calls.push("list".to_string());
        if server.fail_list {
            return Err(failure("list"));
        }
        server.sessions.iter().map(|s| SessionId::new(s.clone())).collect()
    }

    async fn create_session(&self) -> Result<SessionId> {
        let mut server = self.server();
        server.calls.push("create".to_string());
        if server.fail_create {
            return Err(failure("create"));
        }
        server.created += 1;
        let id = format!("session-{}", server.created);
        server.sessions.push(id.clone());
        SessionId::new(id)
    }

    async fn rename_session(&self, old: &SessionId, new: &SessionId) -> Result<()> {
        let mut server = self.server();
        server.calls.push(format!("rename {} {}", old, new));
        if server.fail_rename {
            return Err(failure("rename"));
        }
        if server.sessions.iter().any(|s| s == new.as_str()) {
            return Err(ChatError::Api("status 400: session already exists".to_string()));
        }
        let Some(slot) = server.sessions.iter_mut().find(|s| *s == old.as_str()) else {
            return Err(ChatError::Api("status 404: Session not found".to_string()));
        };
        *slot = new.to_string();
        if let Some(history) = server.histories.remove(old.as_str()) {
            server.histories.insert(new.to_string(), history);
        }
        Ok(())
    }

    async fn delete_session(&self, session: &SessionId) -> Result<()> {
        let mut server = self.server();
        server.calls.push(format!("delete {}", session));
        if server.fail_delete {
            return Err(failure("delete"));
        }
        let before = server.sessions.len();
        server.sessions.retain(|s| s != session.as_str());
        if server.sessions.len() == before {
            return Err(ChatError::Api("status 404: Session not found".to_string()));
        }
        server.histories.remove(session.as_str());
        Ok(())
    }

    async fn get_history(&self, session: &SessionId) -> Result<Vec<HistoryEntry>> {
        let mut server = self.server();
        server.calls.push(format!("history {}", session));
        if server.fail_history {
            return Err(failure("history"));
        }
        Ok(server
            .histories
            .get(session.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(&self, session: &SessionId, message: &str) -> Result<ChunkStream> {
        let mut server = self.server();
        server.calls.push(format!("send {} {}", session, message));
        if server.fail_send {
            return Err(ChatError::NetworkError("connection refused".to_string()));
        }

        let script = server.replies.pop_front().unwrap_or_default();
        let mut items = Vec::new();
        let mut hang = false;
        for chunk in script {
            match chunk {
                ScriptedChunk::Text(text) => items.push(Ok(text)),
                ScriptedChunk::Error(reason) => items.push(Err(ChatError::StreamTransport(reason))),
                ScriptedChunk::Hang => {
                    hang = true;
                    break;
                }
            }
        }

        let stream = futures::stream::iter(items);
        if hang {
            use futures::StreamExt;
            Ok(Box::pin(stream.chain(futures::stream::pending())))
        } else {
            Ok(Box::pin(stream))
        }
    }
}
