//! The in-progress assistant reply.

use quill_types::{ChatMessage, MessageId};

/// Append-only buffer for the assistant message a stream is filling.
///
/// Fragments are appended in arrival order with no dedup: a fragment
/// that arrives twice appears twice. [`close`](Self::close) consumes the
/// accumulator, so a closed message can no longer grow.
#[derive(Debug)]
pub struct MessageAccumulator {
    message: ChatMessage,
    fragments: usize,
}

impl MessageAccumulator {
    /// Open an empty assistant message.
    #[must_use]
    pub fn open() -> Self {
        Self {
            message: ChatMessage::assistant(String::new()),
            fragments: 0,
        }
    }

    /// Append a fragment. Returns `false`, appending nothing, when the
    /// fragment is empty.
    pub fn append(&mut self, fragment: &str) -> bool {
        if fragment.is_empty() {
            return false;
        }
        self.message.content.push_str(fragment);
        self.fragments += 1;
        true
    }

    /// Text accumulated so far.
    pub fn content(&self) -> &str {
        &self.message.content
    }

    /// Id of the message being filled.
    pub fn id(&self) -> &MessageId {
        &self.message.id
    }

    /// How many fragments have been appended.
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Finish the message and hand it over.
    #[must_use]
    pub fn close(self) -> ChatMessage {
        self.message
    }
}

impl Default for MessageAccumulator {
    fn default() -> Self {
        Self::open()
    }
}
