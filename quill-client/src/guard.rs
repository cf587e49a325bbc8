//! Registry enforcing one open reply stream per conversation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use quill_types::{ChatError, ConversationId};
use tokio_util::sync::CancellationToken;

/// Conversations that currently have a reply streaming, with the token
/// that stops each one.
#[derive(Debug, Clone, Default)]
pub(crate) struct ActiveStreams {
    inner: Arc<Mutex<HashMap<ConversationId, CancellationToken>>>,
}

impl ActiveStreams {
    fn lock(&self) -> MutexGuard<'_, HashMap<ConversationId, CancellationToken>> {
        // The map holds no invariant a panic could break halfway.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `id` for a new stream, or fail if one is already open.
    pub(crate) fn acquire(
        &self,
        id: &ConversationId,
        cancel: &CancellationToken,
    ) -> Result<ActiveStreamGuard, ChatError> {
        let mut map = self.lock();
        if map.contains_key(id) {
            return Err(ChatError::StreamInFlight(id.clone()));
        }
        map.insert(id.clone(), cancel.clone());
        Ok(ActiveStreamGuard {
            streams: self.clone(),
            id: id.clone(),
        })
    }

    pub(crate) fn contains(&self, id: &ConversationId) -> bool {
        self.lock().contains_key(id)
    }

    /// Cancel the stream for `id`. Returns whether one was open.
    pub(crate) fn cancel(&self, id: &ConversationId) -> bool {
        match self.lock().get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every open stream. Returns how many there were.
    pub(crate) fn cancel_all(&self) -> usize {
        let map = self.lock();
        for token in map.values() {
            token.cancel();
        }
        map.len()
    }

    fn release(&self, id: &ConversationId) {
        self.lock().remove(id);
    }
}

/// Releases the conversation's slot when dropped.
#[derive(Debug)]
pub(crate) struct ActiveStreamGuard {
    streams: ActiveStreams,
    id: ConversationId,
}

impl Drop for ActiveStreamGuard {
    fn drop(&mut self) {
        self.streams.release(&self.id);
    }
}
