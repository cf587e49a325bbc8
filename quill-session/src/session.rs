//! The conversation view: send a message, stream the reply into it.

use std::sync::Arc;

use futures::StreamExt;
use quill_types::{
    ChatError, ChatMessage, ChatRequest, ChatStream, ChatTransport, Conversation, ConversationId,
    StreamEvent,
};
use tokio_util::sync::CancellationToken;

use crate::accumulator::MessageAccumulator;
use crate::controller::StreamController;
use crate::hook::{SessionEvent, SessionHook};
use crate::notice::Notice;
use crate::store::ConversationStore;

/// Titles back-filled from the first user message are cut to this many
/// characters unless configured otherwise.
pub const DEFAULT_TITLE_MAX_CHARS: usize = 30;

/// How a [`ChatSession`] creates and names conversations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Create conversations through the transport instead of minting a
    /// local id.
    pub remote_create: bool,
    /// Length limit, in characters, for back-filled titles.
    pub title_max_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            remote_create: false,
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
        }
    }
}

/// How a reply stream ended.
#[derive(Debug)]
pub enum StreamStatus {
    /// The backend finished the reply.
    Completed,
    /// The user cancelled. The reply holds whatever arrived before.
    Cancelled,
    /// The request or the stream failed. A notice was raised.
    Failed(ChatError),
}

impl StreamStatus {
    /// Short lowercase name, for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed(_) => "failed",
        }
    }
}

/// Result of [`ChatSession::send`].
#[derive(Debug)]
pub struct SendOutcome {
    /// The assistant reply as stored, or `None` when nothing arrived.
    pub reply: Option<ChatMessage>,
    /// How the stream ended.
    pub status: StreamStatus,
}

/// One open conversation.
///
/// Holds the transcript in memory and writes it through to the store
/// after every change. At most one reply streams at a time; a send while
/// one is in flight fails with [`ChatError::StreamInFlight`].
pub struct ChatSession<T> {
    transport: Arc<T>,
    store: ConversationStore,
    config: SessionConfig,
    conversation: Conversation,
    messages: Vec<ChatMessage>,
    controller: StreamController,
    hooks: Vec<Arc<dyn SessionHook>>,
    notice: Option<Notice>,
}

impl<T> std::fmt::Debug for ChatSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("conversation", &self.conversation.id)
            .field("messages", &self.messages.len())
            .field("state", &self.controller.state())
            .finish_non_exhaustive()
    }
}

impl<T: ChatTransport> ChatSession<T> {
    /// Start a new conversation and persist it.
    ///
    /// With [`SessionConfig::remote_create`] the backend assigns the id;
    /// otherwise a uuid is minted locally.
    pub async fn create(
        transport: Arc<T>,
        store: ConversationStore,
        config: SessionConfig,
        title: &str,
    ) -> Result<Self, ChatError> {
        let conversation = if config.remote_create {
            transport.create_conversation(title).await?
        } else {
            Conversation::new(title.trim())
        };
        store.upsert_conversation(&conversation).await?;
        store.save_messages(&conversation.id, &[]).await?;
        tracing::debug!(
            conversation = %conversation.id,
            remote = config.remote_create,
            "conversation created"
        );
        Ok(Self::assemble(transport, store, config, conversation, Vec::new()))
    }

    /// Reopen a stored conversation with its transcript.
    pub async fn open(
        transport: Arc<T>,
        store: ConversationStore,
        config: SessionConfig,
        id: &ConversationId,
    ) -> Result<Self, ChatError> {
        let conversation = store
            .find_conversation(id)
            .await?
            .ok_or_else(|| ChatError::InvalidRequest(format!("unknown conversation {id}")))?;
        let messages = store.load_messages(id).await?;
        Ok(Self::assemble(transport, store, config, conversation, messages))
    }

    fn assemble(
        transport: Arc<T>,
        store: ConversationStore,
        config: SessionConfig,
        conversation: Conversation,
        messages: Vec<ChatMessage>,
    ) -> Self {
        Self {
            transport,
            store,
            config,
            conversation,
            messages,
            controller: StreamController::new(),
            hooks: Vec::new(),
            notice: None,
        }
    }

    /// Register a hook. Hooks run in registration order.
    pub fn add_hook<H: SessionHook + 'static>(&mut self, hook: H) -> &mut Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// The conversation's metadata.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// The transcript, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// A handle that can cancel the reply from another task.
    pub fn controller(&self) -> StreamController {
        self.controller.clone()
    }

    /// Whether a reply is streaming.
    pub fn is_streaming(&self) -> bool {
        self.controller.is_streaming()
    }

    /// Cancel the reply in flight. Returns whether there was one.
    pub fn cancel(&self) -> bool {
        self.controller.cancel()
    }

    /// The notice raised by the last send, if any.
    pub fn last_notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Take the pending notice, e.g. once a toast has been shown.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// Send `text` as a user message and stream the assistant's reply.
    ///
    /// The user message is stored before the request goes out. Transport
    /// failures do not make this return `Err`: they end up in
    /// [`StreamStatus::Failed`] and raise a notice. `Err` is reserved for
    /// a rejected send (empty text, reply already in flight) and for
    /// storage failures. If storing the user message fails, the transcript
    /// is left as it was.
    ///
    /// Dropping the returned future cancels the reply and returns the
    /// session to idle.
    pub async fn send(&mut self, text: &str) -> Result<SendOutcome, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::InvalidRequest("message is empty".into()));
        }
        let turn = self.controller.begin(&self.conversation.id)?;
        let result = self.exchange(text, turn.token().clone()).await;
        turn.finish();
        result
    }

    async fn exchange(
        &mut self,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<SendOutcome, ChatError> {
        self.notice = None;
        let before = self.conversation.clone();
        self.messages.push(ChatMessage::user(text));
        let backfilled = self
            .conversation
            .backfill_title(text, self.config.title_max_chars);
        self.conversation.touch();
        if let Err(e) = self.persist().await {
            self.messages.pop();
            self.conversation = before;
            return Err(e);
        }
        if backfilled {
            tracing::debug!(conversation = %self.conversation.id, title = %self.conversation.title, "title back-filled");
        }

        let request = ChatRequest::new(text, self.conversation.id.clone());
        let stream = match self.transport.open_stream(request, cancel.clone()).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(conversation = %self.conversation.id, error = %e, "chat request failed");
                let status = StreamStatus::Failed(e);
                self.raise_failure(&status);
                self.emit(&SessionEvent::StreamFinished {
                    conversation: &self.conversation.id,
                    status: &status,
                    chars: 0,
                });
                return Ok(SendOutcome {
                    reply: None,
                    status,
                });
            }
        };

        let (accumulator, status) = self.read_reply(stream, &cancel).await;
        let reply = accumulator.close();
        let kept = !reply.content.is_empty();
        if kept {
            self.messages.push(reply.clone());
        }
        self.raise_failure(&status);

        self.conversation.touch();
        let persisted = self.persist().await;
        self.emit(&SessionEvent::StreamFinished {
            conversation: &self.conversation.id,
            status: &status,
            chars: reply.content.chars().count(),
        });
        persisted?;

        Ok(SendOutcome {
            reply: kept.then_some(reply),
            status,
        })
    }

    /// Drain the stream into a fresh assistant message until it ends or
    /// `cancel` fires.
    async fn read_reply(
        &self,
        mut stream: ChatStream,
        cancel: &CancellationToken,
    ) -> (MessageAccumulator, StreamStatus) {
        let mut accumulator = MessageAccumulator::open();
        self.emit(&SessionEvent::StreamStarted {
            conversation: &self.conversation.id,
            message: accumulator.id(),
        });

        let status = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                event = stream.receiver.next() => Some(event),
            };
            let Some(event) = next else {
                break StreamStatus::Cancelled;
            };

            match event {
                Some(StreamEvent::TextDelta(fragment)) => {
                    if accumulator.append(&fragment) {
                        self.emit(&SessionEvent::Delta {
                            conversation: &self.conversation.id,
                            fragment: &fragment,
                            content: accumulator.content(),
                        });
                    }
                }
                Some(StreamEvent::Done) => break StreamStatus::Completed,
                Some(StreamEvent::Error(e)) => break StreamStatus::Failed(ChatError::Stream(e)),
                // Transports end silently on cancellation.
                None if cancel.is_cancelled() => break StreamStatus::Cancelled,
                None => break StreamStatus::Completed,
            }
        };

        (accumulator, status)
    }

    fn raise_failure(&mut self, status: &StreamStatus) {
        if let StreamStatus::Failed(e) = status {
            let notice = Notice::from_error(e);
            self.emit(&SessionEvent::Notice(&notice));
            self.notice = Some(notice);
        }
    }

    fn emit(&self, event: &SessionEvent<'_>) {
        for hook in &self.hooks {
            hook.on_event(event);
        }
    }

    async fn persist(&self) -> Result<(), ChatError> {
        self.store.upsert_conversation(&self.conversation).await?;
        self.store
            .save_messages(&self.conversation.id, &self.messages)
            .await
    }

    /// Cancel any reply in flight and remove the conversation from the
    /// store.
    pub async fn delete(self) -> Result<(), ChatError> {
        self.controller.cancel();
        self.store
            .delete_conversation(&self.conversation.id)
            .await?;
        Ok(())
    }
}
