pub mod client;
pub mod decoder;
pub mod types;
pub mod utils;

pub use client::HttpChatService;
pub use types::*;

use crate::error::Result;
use crate::session::SessionId;
use futures::stream::Stream;
use std::pin::Pin;

/// Incremental text of a streamed reply. Dropping it closes the connection.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Remote operations the chat core depends on. The server is the source of
/// truth for sessions and their history.
#[allow(async_fn_in_trait)]
pub trait ChatService {
    async fn list_sessions(&self) -> Result<Vec<SessionId>>;

    async fn create_session(&self) -> Result<SessionId>;

    async fn rename_session(&self, old: &SessionId, new: &SessionId) -> Result<()>;

    async fn delete_session(&self, session: &SessionId) -> Result<()>;

    async fn get_history(&self, session: &SessionId) -> Result<Vec<HistoryEntry>>;

    /// Resolves once the server accepted the request; the reply body
    /// follows through the returned stream.
    async fn send_message(&self, session: &SessionId, message: &str) -> Result<ChunkStream>;
}
