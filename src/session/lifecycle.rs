use super::{ChatState, SessionId};
use crate::api::ChatService;
use crate::error::{ChatError, Result};

/// Create, rename and delete sessions against the server while keeping the
/// local registry consistent. Whenever the outcome of a remote call is
/// unclear the registry is resynced from the server.
pub struct SessionLifecycleManager<'a, S> {
    service: &'a S,
}

impl<'a, S: ChatService> SessionLifecycleManager<'a, S> {
    pub fn new(service: &'a S) -> Self {
        Self { service }
    }

    /// Ask the server for a new session and append it to the registry.
    /// Nothing changes locally when the server call fails.
    pub async fn create(&self, chat: &mut ChatState) -> Result<SessionId> {
        let session = self.service.create_session().await.map_err(|e| {
            tracing::warn!(error = %e, "Session creation failed");
            ChatError::SessionCreate(e.to_string())
        })?;

        tracing::info!(session = %session, "Session created");
        chat.registry.insert(session.clone());
        Ok(session)
    }

    /// The current session, creating one first if there is none
    pub async fn ensure_current(&self, chat: &mut ChatState) -> Result<SessionId> {
        match chat.registry.current() {
            Some(current) => Ok(current.clone()),
            None => {
                let session = self.create(chat).await?;
                chat.registry.set_current(&session)?;
                Ok(session)
            }
        }
    }

    pub async fn rename(
        &self,
        chat: &mut ChatState,
        old: &SessionId,
        new: &SessionId,
    ) -> Result<()> {
        if old == new {
            return Ok(());
        }

        if let Err(e) = self.service.rename_session(old, new).await {
            tracing::warn!(old = %old, new = %new, error = %e, "Session rename failed, resyncing");
            self.resync_after_failure(chat).await;
            return Err(ChatError::SessionRename(format!("{} -> {}: {}", old, new, e)));
        }

        tracing::info!(old = %old, new = %new, "Session renamed");
        chat.registry.rename(old, new);

        // The local rename only bridges the gap until the server list is back
        if let Err(e) = self.resync(chat).await {
            tracing::warn!(error = %e, "Could not refresh sessions after rename");
        }
        Ok(())
    }

    /// Delete a session. If it was current, the first remaining session
    /// takes over; deleting the last one creates a fresh session.
    pub async fn delete(&self, chat: &mut ChatState, session: &SessionId) -> Result<()> {
        if let Err(e) = self.service.delete_session(session).await {
            tracing::warn!(session = %session, error = %e, "Session delete failed, resyncing");
            self.resync_after_failure(chat).await;
            return Err(ChatError::SessionDelete(format!("{}: {}", session, e)));
        }

        tracing::info!(session = %session, "Session deleted");
        chat.registry.remove(session);

        if chat.registry.is_empty() {
            self.create(chat).await?;
        }
        Ok(())
    }

    /// Replace the registry with the server's session list. An empty list
    /// gets a freshly created session; a current session that disappeared
    /// is replaced by the first listed one.
    pub async fn resync(&self, chat: &mut ChatState) -> Result<()> {
        let sessions = self.service.list_sessions().await.map_err(|e| {
            tracing::warn!(error = %e, "Listing sessions failed");
            ChatError::SessionSync(e.to_string())
        })?;

        tracing::debug!(count = sessions.len(), "Sessions resynced");
        chat.registry.replace_all(sessions);

        if chat.registry.is_empty() {
            self.create(chat).await?;
        }
        Ok(())
    }

    async fn resync_after_failure(&self, chat: &mut ChatState) {
        if let Err(e) = self.resync(chat).await {
            tracing::warn!(error = %e, "Resync after failure did not succeed");
        }
    }
}
