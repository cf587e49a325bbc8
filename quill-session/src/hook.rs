//! Observers for session progress.
//!
//! A renderer registers a [`SessionHook`] to repaint the open message on
//! every [`SessionEvent::Delta`]; [`TracingHook`] turns the same events
//! into structured `tracing` events.

use quill_types::{ConversationId, MessageId};

use crate::notice::{Notice, NoticeLevel};
use crate::session::StreamStatus;

/// Something that happened while a session was sending.
#[derive(Debug)]
#[non_exhaustive]
pub enum SessionEvent<'a> {
    /// The reply stream opened and an assistant message was started.
    StreamStarted {
        /// Conversation receiving the reply.
        conversation: &'a ConversationId,
        /// The open assistant message.
        message: &'a MessageId,
    },
    /// A fragment was appended to the open message.
    Delta {
        /// Conversation receiving the reply.
        conversation: &'a ConversationId,
        /// The fragment just appended.
        fragment: &'a str,
        /// The message content including the fragment.
        content: &'a str,
    },
    /// The stream ended and the session is idle again.
    StreamFinished {
        /// Conversation that received the reply.
        conversation: &'a ConversationId,
        /// How the stream ended.
        status: &'a StreamStatus,
        /// Characters in the final message.
        chars: usize,
    },
    /// A notice for the user.
    Notice(&'a Notice),
}

/// Receives [`SessionEvent`]s synchronously, in order.
///
/// Hooks observe only; they cannot alter the stream. Any
/// `Fn(&SessionEvent<'_>)` closure is a hook.
pub trait SessionHook: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &SessionEvent<'_>);
}

impl<F> SessionHook for F
where
    F: Fn(&SessionEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &SessionEvent<'_>) {
        self(event);
    }
}

/// A [`SessionHook`] that emits structured [`tracing`] events.
///
/// # Levels
///
/// | Event | Level |
/// |-------|-------|
/// | Delta | `TRACE` |
/// | StreamStarted, StreamFinished | `DEBUG` |
/// | Notice | by notice level |
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHook;

impl TracingHook {
    /// Create a new `TracingHook`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SessionHook for TracingHook {
    fn on_event(&self, event: &SessionEvent<'_>) {
        match event {
            SessionEvent::StreamStarted {
                conversation,
                message,
            } => {
                tracing::debug!(conversation = %conversation, message = %message, "quill.stream.started");
            }
            SessionEvent::Delta {
                conversation,
                fragment,
                content,
            } => {
                tracing::trace!(
                    conversation = %conversation,
                    fragment_len = fragment.len(),
                    total_len = content.len(),
                    "quill.stream.delta"
                );
            }
            SessionEvent::StreamFinished {
                conversation,
                status,
                chars,
            } => {
                tracing::debug!(
                    conversation = %conversation,
                    status = status.label(),
                    chars,
                    "quill.stream.finished"
                );
            }
            SessionEvent::Notice(notice) => match notice.level {
                NoticeLevel::Info => tracing::info!(text = %notice.text, "quill.notice"),
                NoticeLevel::Warning => tracing::warn!(text = %notice.text, "quill.notice"),
                NoticeLevel::Error => tracing::error!(text = %notice.text, "quill.notice"),
            },
        }
    }
}
