use crate::api::ChunkStream;
use crate::conversation::{Message, MessageId};
use crate::error::{ChatError, Result};
use crate::session::{ChatState, SessionId};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const EVENT_BUFFER: usize = 64;

/// Prefix of the content that replaces a failed reply
pub const ERROR_PREFIX: &str = "Error: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
}

impl IngestState {
    pub fn is_busy(self) -> bool {
        matches!(self, IngestState::Sending | IngestState::Streaming)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, IngestState::Completed | IngestState::Failed)
    }
}

/// Events produced by the transport for one send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    ChunkReceived(String),
    StreamEnded,
    StreamFailed(String),
}

/// Identifies the messages of one send invocation
#[derive(Debug, Clone)]
pub struct SendTicket {
    pub session: SessionId,
    pub user_id: MessageId,
    pub reply_id: MessageId,
}

/// Folds the reply stream of a single outstanding send into its
/// placeholder message.
#[derive(Debug)]
pub struct StreamingIngester {
    state: IngestState,
    ticket: Option<SendTicket>,
}

impl Default for StreamingIngester {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingIngester {
    pub fn new() -> Self {
        Self {
            state: IngestState::Idle,
            ticket: None,
        }
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    /// Start a send: append the user message and an empty pending reply
    /// right away, before the request goes out.
    pub fn begin(
        &mut self,
        chat: &mut ChatState,
        session: SessionId,
        text: &str,
    ) -> Result<SendTicket> {
        if self.state.is_busy() || chat.store.has_pending() {
            return Err(ChatError::Busy);
        }

        let user_id = chat.next_message_id();
        let reply_id = chat.next_message_id();

        if chat.store.is_scoped_to(&session) {
            chat.store.append(Message::user(user_id, text));
            chat.store.append(Message::placeholder(reply_id));
        } else {
            tracing::warn!(session = %session, "Sending to a session that is not displayed");
        }

        let ticket = SendTicket {
            session,
            user_id,
            reply_id,
        };
        tracing::debug!(
            session = %ticket.session,
            user = %ticket.user_id,
            reply = %ticket.reply_id,
            "Send started"
        );

        self.state = IngestState::Sending;
        self.ticket = Some(ticket.clone());
        Ok(ticket)
    }

    /// The server accepted the request; the reply is on its way
    pub fn accept(&mut self) {
        if self.state == IngestState::Sending {
            self.state = IngestState::Streaming;
        }
    }

    /// Apply one transport event. Returns true when the reply message was
    /// mutated. Events after a terminal state are ignored, as are updates
    /// for a session that is no longer displayed.
    pub fn apply(&mut self, chat: &mut ChatState, event: StreamEvent) -> bool {
        if !self.state.is_busy() {
            tracing::debug!(state = ?self.state, "Dropping stream event after send finished");
            return false;
        }
        let Some(ticket) = &self.ticket else {
            return false;
        };

        let reply_id = ticket.reply_id;
        let visible = chat.store.is_scoped_to(&ticket.session);

        match event {
            StreamEvent::ChunkReceived(chunk) => {
                self.state = IngestState::Streaming;
                visible && chat.store.update_by_id(reply_id, |m| m.content.push_str(&chunk))
            }
            StreamEvent::StreamEnded => {
                self.state = IngestState::Completed;
                tracing::debug!(session = %ticket.session, "Reply completed");
                visible && chat.store.update_by_id(reply_id, |m| m.pending = false)
            }
            StreamEvent::StreamFailed(reason) => {
                self.state = IngestState::Failed;
                tracing::warn!(session = %ticket.session, reason = %reason, "Reply failed");
                let content = format!("{}{}", ERROR_PREFIX, reason);
                visible
                    && chat.store.update_by_id(reply_id, |m| {
                        m.content = content;
                        m.pending = false;
                    })
            }
        }
    }
}

/// Drive `stream` on a separate task and forward its items as events.
/// Chunks keep their arrival order; the last event is always
/// `StreamEnded` or `StreamFailed`. Cancelling drops the stream.
pub fn spawn_transport(
    mut stream: ChunkStream,
    cancel: CancellationToken,
) -> mpsc::Receiver<StreamEvent> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    tokio::spawn(async move {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let reason = ChatError::Cancelled.to_string();
                    let _ = tx.send(StreamEvent::StreamFailed(reason)).await;
                    break;
                }
                item = stream.next() => item,
            };

            let event = match next {
                Some(Ok(chunk)) => StreamEvent::ChunkReceived(chunk),
                Some(Err(ChatError::StreamTransport(reason))) => StreamEvent::StreamFailed(reason),
                Some(Err(e)) => StreamEvent::StreamFailed(e.to_string()),
                None => StreamEvent::StreamEnded,
            };
            let terminal = !matches!(event, StreamEvent::ChunkReceived(_));

            if tx.send(event).await.is_err() || terminal {
                break;
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;

    fn setup() -> (ChatState, SessionId) {
        let mut chat = ChatState::new();
        let session = SessionId::new("a").unwrap();
        chat.registry.insert(session.clone());
        chat.store.replace_all(Some(session.clone()), Vec::new());
        (chat, session)
    }

    fn chunks(items: &[&str]) -> ChunkStream {
        let items: Vec<Result<String>> = items.iter().map(|s| Ok(s.to_string())).collect();
        Box::pin(futures::stream::iter(items))
    }

    async fn drain(
        ingester: &mut StreamingIngester,
        chat: &mut ChatState,
        reply_id: MessageId,
        mut events: mpsc::Receiver<StreamEvent>,
    ) -> Vec<String> {
        let mut seen = Vec::new();
        while let Some(event) = events.recv().await {
            ingester.apply(chat, event);
            let reply = chat.store.get(reply_id).unwrap();
            seen.push(reply.content.clone());
            if ingester.state().is_terminal() {
                break;
            }
        }
        seen
    }

    #[test]
    fn test_begin_inserts_optimistic_messages() {
        let (mut chat, session) = setup();
        let mut ingester = StreamingIngester::new();

        let ticket = ingester.begin(&mut chat, session, "hello").unwrap();

        assert_eq!(ingester.state(), IngestState::Sending);
        let messages = chat.store.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hello");
        assert!(!messages[0].pending);
        assert_eq!(messages[1].id, ticket.reply_id);
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(messages[1].pending);
        assert_ne!(ticket.user_id, ticket.reply_id);
    }

    #[test]
    fn test_second_send_is_rejected_while_busy() {
        let (mut chat, session) = setup();
        let mut ingester = StreamingIngester::new();
        ingester.begin(&mut chat, session.clone(), "one").unwrap();

        let second = ingester.begin(&mut chat, session, "two");

        assert!(matches!(second, Err(ChatError::Busy)));
        assert_eq!(chat.store.len(), 2);
        assert_eq!(chat.store.messages().iter().filter(|m| m.pending).count(), 1);
    }

    #[test]
    fn test_chunks_accumulate_and_pending_clears_at_end() {
        let (mut chat, session) = setup();
        let mut ingester = StreamingIngester::new();
        let ticket = ingester.begin(&mut chat, session, "hi").unwrap();
        ingester.accept();
        assert_eq!(ingester.state(), IngestState::Streaming);

        for chunk in ["Hel", "lo", " world"] {
            assert!(ingester.apply(&mut chat, StreamEvent::ChunkReceived(chunk.to_string())));
            assert!(chat.store.get(ticket.reply_id).unwrap().pending);
        }
        ingester.apply(&mut chat, StreamEvent::StreamEnded);

        let reply = chat.store.get(ticket.reply_id).unwrap();
        assert_eq!(reply.content, "Hello world");
        assert!(!reply.pending);
        assert_eq!(ingester.state(), IngestState::Completed);
    }

    #[test]
    fn test_empty_reply_completes_with_empty_content() {
        let (mut chat, session) = setup();
        let mut ingester = StreamingIngester::new();
        let ticket = ingester.begin(&mut chat, session, "hi").unwrap();

        ingester.apply(&mut chat, StreamEvent::StreamEnded);

        let reply = chat.store.get(ticket.reply_id).unwrap();
        assert_eq!(reply.content, "");
        assert!(!reply.pending);
    }

    #[test]
    fn test_failure_replaces_content_and_leaves_others_alone() {
        let (mut chat, session) = setup();
        chat.store.append(Message::assistant(MessageId(900), "earlier answer"));
        let mut ingester = StreamingIngester::new();
        let ticket = ingester.begin(&mut chat, session, "hi").unwrap();

        ingester.apply(&mut chat, StreamEvent::ChunkReceived("partial".to_string()));
        ingester.apply(
            &mut chat,
            StreamEvent::StreamFailed("connection reset".to_string()),
        );

        let reply = chat.store.get(ticket.reply_id).unwrap();
        assert_eq!(reply.content, "Error: connection reset");
        assert!(!reply.pending);
        assert_eq!(ingester.state(), IngestState::Failed);
        assert_eq!(chat.store.get(MessageId(900)).unwrap().content, "earlier answer");
        assert_eq!(chat.store.get(ticket.user_id).unwrap().content, "hi");
    }

    #[test]
    fn test_no_chunk_applied_after_terminal_state() {
        let (mut chat, session) = setup();
        let mut ingester = StreamingIngester::new();
        let ticket = ingester.begin(&mut chat, session, "hi").unwrap();
        ingester.apply(&mut chat, StreamEvent::ChunkReceived("done".to_string()));
        ingester.apply(&mut chat, StreamEvent::StreamEnded);

        let applied = ingester.apply(&mut chat, StreamEvent::ChunkReceived(" late".to_string()));
        let failed = ingester.apply(&mut chat, StreamEvent::StreamFailed("late".to_string()));

        assert!(!applied && !failed);
        assert_eq!(chat.store.get(ticket.reply_id).unwrap().content, "done");
        assert_eq!(ingester.state(), IngestState::Completed);
    }

    #[test]
    fn test_updates_dropped_after_session_switch() {
        let (mut chat, session) = setup();
        let mut ingester = StreamingIngester::new();
        ingester.begin(&mut chat, session, "hi").unwrap();

        let b = SessionId::new("b").unwrap();
        chat.registry.insert(b.clone());
        chat.registry.set_current(&b).unwrap();
        chat.store
            .replace_all(Some(b), vec![Message::assistant(MessageId(500), "b content")]);

        let applied = ingester.apply(&mut chat, StreamEvent::ChunkReceived("leak".to_string()));
        ingester.apply(&mut chat, StreamEvent::StreamEnded);

        assert!(!applied);
        assert_eq!(chat.store.messages(), &[Message::assistant(MessageId(500), "b content")]);
    }

    #[test]
    fn test_can_send_again_after_completion() {
        let (mut chat, session) = setup();
        let mut ingester = StreamingIngester::new();
        ingester.begin(&mut chat, session.clone(), "one").unwrap();
        ingester.apply(&mut chat, StreamEvent::StreamEnded);

        let ticket = ingester.begin(&mut chat, session, "two").unwrap();

        assert_eq!(chat.store.len(), 4);
        assert_eq!(chat.store.messages()[3].id, ticket.reply_id);
    }

    #[tokio::test]
    async fn test_transport_delivers_chunks_in_order() {
        let (mut chat, session) = setup();
        let mut ingester = StreamingIngester::new();
        let cancel = CancellationToken::new();
        let ticket = ingester.begin(&mut chat, session, "hi").unwrap();
        ingester.accept();

        let events = spawn_transport(chunks(&["Hel", "lo", " world"]), cancel);
        let seen = drain(&mut ingester, &mut chat, ticket.reply_id, events).await;

        assert_eq!(seen, vec!["Hel", "Hello", "Hello world", "Hello world"]);
        assert_eq!(ingester.state(), IngestState::Completed);
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let (mut chat, session) = setup();
        let mut ingester = StreamingIngester::new();
        let cancel = CancellationToken::new();
        let ticket = ingester.begin(&mut chat, session, "hi").unwrap();

        let stream: ChunkStream = Box::pin(futures::stream::iter(vec![
            Ok("par".to_string()),
            Err(ChatError::StreamTransport("connection reset".to_string())),
            Ok("ignored".to_string()),
        ]));
        let events = spawn_transport(stream, cancel);
        drain(&mut ingester, &mut chat, ticket.reply_id, events).await;

        let reply = chat.store.get(ticket.reply_id).unwrap();
        assert_eq!(reply.content, "Error: connection reset");
        assert!(!reply.pending);
    }

    #[tokio::test]
    async fn test_cancel_stops_hanging_stream() {
        let (mut chat, session) = setup();
        let mut ingester = StreamingIngester::new();
        let cancel = CancellationToken::new();
        let ticket = ingester.begin(&mut chat, session, "hi").unwrap();

        let stream: ChunkStream = Box::pin(
            futures::stream::iter(vec![Ok::<_, ChatError>("partial".to_string())])
                .chain(futures::stream::pending()),
        );
        let mut events = spawn_transport(stream, cancel.clone());

        let first = events.recv().await.unwrap();
        ingester.apply(&mut chat, first);
        cancel.cancel();
        let last = events.recv().await.unwrap();
        ingester.apply(&mut chat, last);

        assert_eq!(ingester.state(), IngestState::Failed);
        let reply = chat.store.get(ticket.reply_id).unwrap();
        assert_eq!(reply.content, "Error: cancelled");
        assert!(!reply.pending);
        assert!(events.recv().await.is_none());
    }
}
