use crate::api::{ChatService, HistoryEntry};
use crate::conversation::{Message, Role};
use crate::error::{ChatError, Result};
use crate::session::{ChatState, SessionId};
use tokio_util::sync::CancellationToken;

/// Tag carried by one history load
#[derive(Debug, Clone)]
pub struct LoadTicket {
    pub session: SessionId,
    pub generation: u64,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The store now holds this many messages of the loaded session
    Applied(usize),
    /// A newer load was started or the session is no longer current
    Discarded,
}

/// Loads server-side history into the message store whenever the current
/// session changes. Only the latest load may touch the store.
#[derive(Debug, Default)]
pub struct HistorySync {
    generation: u64,
    in_flight: Option<CancellationToken>,
}

impl HistorySync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a load for `session`, superseding and cancelling any earlier one
    pub fn begin(&mut self, session: SessionId) -> LoadTicket {
        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
        }

        self.generation += 1;
        let cancel = CancellationToken::new();
        self.in_flight = Some(cancel.clone());

        tracing::debug!(session = %session, generation = self.generation, "History load started");
        LoadTicket {
            session,
            generation: self.generation,
            cancel,
        }
    }

    pub fn is_latest(&self, ticket: &LoadTicket, chat: &ChatState) -> bool {
        ticket.generation == self.generation && chat.registry.is_current(&ticket.session)
    }

    /// Fetch the entries for a ticket. Resolves with `Cancelled` as soon as
    /// the ticket is superseded.
    pub async fn fetch<S: ChatService>(
        service: &S,
        ticket: &LoadTicket,
    ) -> Result<Vec<HistoryEntry>> {
        tokio::select! {
            biased;
            _ = ticket.cancel.cancelled() => Err(ChatError::Cancelled),
            result = service.get_history(&ticket.session) => result,
        }
    }

    /// Apply a finished load. Stale results are dropped without touching the
    /// store. A failed load leaves the target session with an empty history
    /// and reports the error.
    pub fn complete(
        &mut self,
        chat: &mut ChatState,
        ticket: LoadTicket,
        result: Result<Vec<HistoryEntry>>,
    ) -> Result<LoadOutcome> {
        if !self.is_latest(&ticket, chat) {
            tracing::debug!(
                session = %ticket.session,
                generation = ticket.generation,
                latest = self.generation,
                "Discarding stale history load"
            );
            return Ok(LoadOutcome::Discarded);
        }
        self.in_flight = None;

        match result {
            Ok(entries) => {
                let messages = to_messages(chat, entries);
                chat.store.replace_all(Some(ticket.session.clone()), messages);
                let count = chat.store.len();
                tracing::debug!(session = %ticket.session, messages = count, "History loaded");
                Ok(LoadOutcome::Applied(count))
            }
            Err(e) => {
                tracing::warn!(session = %ticket.session, error = %e, "History load failed");
                chat.store.replace_all(Some(ticket.session.clone()), Vec::new());
                Err(ChatError::HistoryLoad(format!("{}: {}", ticket.session, e)))
            }
        }
    }

    /// Load the history of `session` and install it if still relevant
    pub async fn load<S: ChatService>(
        &mut self,
        service: &S,
        chat: &mut ChatState,
        session: SessionId,
    ) -> Result<LoadOutcome> {
        let ticket = self.begin(session);
        let result = Self::fetch(service, &ticket).await;
        if matches!(result, Err(ChatError::Cancelled)) {
            return Ok(LoadOutcome::Discarded);
        }
        self.complete(chat, ticket, result)
    }

    /// Drop any load in flight, e.g. when no session is current anymore
    pub fn reset(&mut self, chat: &mut ChatState) {
        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
        }
        self.generation += 1;
        chat.store.replace_all(None, Vec::new());
    }
}

fn to_messages(chat: &mut ChatState, entries: Vec<HistoryEntry>) -> Vec<Message> {
    entries
        .into_iter()
        .filter_map(|entry| match Role::parse(&entry.role) {
            Some(role) => Some(Message {
                id: chat.next_message_id(),
                role,
                content: entry.content,
                pending: false,
            }),
            None => {
                tracing::warn!(role = %entry.role, "Skipping history entry with unknown role");
                None
            }
        })
        .collect()
}
