use crate::api::ChatService;
use crate::conversation::{Message, MessageId};
use crate::error::{ChatError, Result};
use crate::history::{HistorySync, LoadOutcome};
use crate::session::{ChatState, SessionId, SessionLifecycleManager};
use crate::streaming::{spawn_transport, IngestState, StreamEvent, StreamingIngester};
use tokio_util::sync::CancellationToken;

/// Result of one `send`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub session: SessionId,
    pub reply_id: MessageId,
    pub state: IngestState,
}

/// Client-side chat state plus the remote service it mirrors.
///
/// Every operation that may move the current session ends by making the
/// message store show the current session again, loading its history when
/// the store was showing something else.
pub struct ChatClient<S> {
    service: S,
    state: ChatState,
    ingester: StreamingIngester,
    history: HistorySync,
}

impl<S: ChatService> ChatClient<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            state: ChatState::new(),
            ingester: StreamingIngester::new(),
            history: HistorySync::new(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn messages(&self) -> &[Message] {
        self.state.store.messages()
    }

    pub fn sessions(&self) -> &[SessionId] {
        self.state.registry.sessions()
    }

    pub fn current(&self) -> Option<&SessionId> {
        self.state.current_session()
    }

    #[cfg(test)]
    pub fn ingest_state(&self) -> IngestState {
        self.ingester.state()
    }

    #[cfg(test)]
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Fetch the session list and show the history of the current session
    pub async fn start(&mut self) -> Result<()> {
        SessionLifecycleManager::new(&self.service)
            .resync(&mut self.state)
            .await?;
        self.sync_history().await
    }

    pub async fn select(&mut self, session: &SessionId) -> Result<()> {
        self.state.registry.set_current(session)?;
        self.sync_history().await
    }

    pub async fn new_session(&mut self) -> Result<SessionId> {
        let session = SessionLifecycleManager::new(&self.service)
            .create(&mut self.state)
            .await?;
        self.state.registry.set_current(&session)?;
        self.sync_history().await?;
        Ok(session)
    }

    /// Rename `old` to `new`. `new` is user input: it is trimmed, and a
    /// blank one is rejected before anything is sent to the server.
    pub async fn rename(&mut self, old: &SessionId, new: &str) -> Result<()> {
        let new = SessionId::from_input(new)?;
        let result = SessionLifecycleManager::new(&self.service)
            .rename(&mut self.state, old, &new)
            .await;
        let synced = self.sync_history().await;
        session_error_first(result, synced)
    }

    pub async fn delete(&mut self, session: &SessionId) -> Result<()> {
        let result = SessionLifecycleManager::new(&self.service)
            .delete(&mut self.state, session)
            .await;
        let synced = self.sync_history().await;
        session_error_first(result, synced)
    }

    pub async fn resync(&mut self) -> Result<()> {
        let result = SessionLifecycleManager::new(&self.service)
            .resync(&mut self.state)
            .await;
        let synced = self.sync_history().await;
        session_error_first(result, synced)
    }

    /// Reload the current session's history even if it is already shown
    pub async fn refresh_history(&mut self) -> Result<LoadOutcome> {
        match self.state.current_session().cloned() {
            Some(session) => self.history.load(&self.service, &mut self.state, session).await,
            None => {
                self.history.reset(&mut self.state);
                Ok(LoadOutcome::Applied(0))
            }
        }
    }

    /// Make the store show the current session
    async fn sync_history(&mut self) -> Result<()> {
        match self.state.current_session().cloned() {
            Some(session) if !self.state.is_displaying(&session) => {
                self.history
                    .load(&self.service, &mut self.state, session)
                    .await?;
            }
            Some(_) => {}
            None => {
                if self.state.store.session().is_some() {
                    self.history.reset(&mut self.state);
                }
            }
        }
        Ok(())
    }

    /// Send `text` to the current session, creating one first if needed,
    /// and stream the reply into the store. `on_update` sees the reply
    /// message after every visible change.
    ///
    /// Transport problems do not make this fail: they end the send in
    /// `IngestState::Failed` with the reason written into the reply.
    ///
    /// The client is borrowed mutably until the reply ends, so the current
    /// session cannot change under a running send. A front end that wants to
    /// switch mid-stream cancels `cancel` first; the read is then dropped.
    pub async fn send<F>(
        &mut self,
        text: &str,
        cancel: CancellationToken,
        mut on_update: F,
    ) -> Result<SendOutcome>
    where
        F: FnMut(&Message),
    {
        if self.ingester.state().is_busy() {
            return Err(ChatError::Busy);
        }

        let session = SessionLifecycleManager::new(&self.service)
            .ensure_current(&mut self.state)
            .await?;
        if let Err(e) = self.sync_history().await {
            tracing::warn!(session = %session, error = %e, "Sending without history");
        }

        let ticket = self
            .ingester
            .begin(&mut self.state, session.clone(), text)?;
        let reply_id = ticket.reply_id;

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChatError::Cancelled),
            result = self.service.send_message(&session, text) => result,
        };

        match opened {
            Ok(stream) => {
                self.ingester.accept();
                let mut events = spawn_transport(stream, cancel);
                while let Some(event) = events.recv().await {
                    self.apply(reply_id, event, &mut on_update);
                    if self.ingester.state().is_terminal() {
                        break;
                    }
                }
                if self.ingester.state().is_busy() {
                    let reason = "stream closed unexpectedly".to_string();
                    self.apply(reply_id, StreamEvent::StreamFailed(reason), &mut on_update);
                }
            }
            Err(e) => {
                tracing::warn!(session = %session, error = %e, "Send request failed");
                self.apply(reply_id, StreamEvent::StreamFailed(e.to_string()), &mut on_update);
            }
        }

        Ok(SendOutcome {
            session,
            reply_id,
            state: self.ingester.state(),
        })
    }

    fn apply<F>(&mut self, reply_id: MessageId, event: StreamEvent, on_update: &mut F)
    where
        F: FnMut(&Message),
    {
        if self.ingester.apply(&mut self.state, event) {
            if let Some(reply) = self.state.store.get(reply_id) {
                on_update(reply);
            }
        }
    }
}

/// A failed session operation outranks the history reload that follows it
fn session_error_first(result: Result<()>, synced: Result<()>) -> Result<()> {
    match (result, synced) {
        (Err(e), Err(history)) => {
            tracing::warn!(error = %history, "History reload failed after session error");
            Err(e)
        }
        (result, synced) => result.and(synced),
    }
}
