//! Idle/streaming state machine with cancellation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use quill_types::{ChatError, ConversationId};
use tokio_util::sync::CancellationToken;

/// Whether a reply is streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing in flight. A send may start.
    Idle,
    /// A reply is being read.
    Streaming,
}

#[derive(Debug, Default)]
struct Slot {
    token: Option<CancellationToken>,
    generation: u64,
}

/// Guards the `Idle -> Streaming -> Idle` cycle of one conversation view.
///
/// Clones share state, so a UI task can hold a clone and call
/// [`cancel`](Self::cancel) while the session is busy reading.
#[derive(Debug, Clone, Default)]
pub struct StreamController {
    inner: Arc<Mutex<Slot>>,
}

impl StreamController {
    /// A controller in the idle state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    pub fn state(&self) -> StreamState {
        if self.lock().token.is_some() {
            StreamState::Streaming
        } else {
            StreamState::Idle
        }
    }

    /// Shorthand for `state() == StreamState::Streaming`.
    pub fn is_streaming(&self) -> bool {
        self.state() == StreamState::Streaming
    }

    /// Move to `Streaming` and hand out the turn the read loop runs under.
    ///
    /// Fails with [`ChatError::StreamInFlight`] when already streaming.
    /// Dropping the returned [`StreamTurn`] goes back to `Idle`, so a send
    /// abandoned mid-await cannot leave the controller stuck.
    pub fn begin(&self, conversation: &ConversationId) -> Result<StreamTurn, ChatError> {
        let mut slot = self.lock();
        if slot.token.is_some() {
            return Err(ChatError::StreamInFlight(conversation.clone()));
        }
        let token = CancellationToken::new();
        slot.generation += 1;
        slot.token = Some(token.clone());
        Ok(StreamTurn {
            controller: self.clone(),
            generation: slot.generation,
            token,
            finished: false,
        })
    }

    /// Ask the read loop to stop. Returns whether a stream was in flight.
    ///
    /// The state returns to `Idle` once the loop has observed the request
    /// and its turn has ended.
    pub fn cancel(&self) -> bool {
        match self.lock().token.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Back to `Idle`, whatever ended the stream.
    pub fn finish(&self) {
        self.lock().token.take();
    }

    /// Release the slot only if `generation` still owns it.
    fn release(&self, generation: u64) {
        let mut slot = self.lock();
        if slot.generation == generation {
            slot.token.take();
        }
    }
}

/// One reply in flight, from [`StreamController::begin`] until dropped.
#[derive(Debug)]
#[must_use = "dropping the turn immediately returns the controller to Idle"]
pub struct StreamTurn {
    controller: StreamController,
    generation: u64,
    token: CancellationToken,
    finished: bool,
}

impl StreamTurn {
    /// The token the read loop observes.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// End the turn normally.
    pub fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for StreamTurn {
    fn drop(&mut self) {
        // An unfinished turn was abandoned: stop whatever it started.
        if !self.finished {
            self.token.cancel();
            tracing::debug!("quill.stream.abandoned");
        }
        self.controller.release(self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let c = StreamController::new();
        assert_eq!(c.state(), StreamState::Idle);
        assert!(!c.cancel());
    }

    #[test]
    fn begin_then_finish_cycles_state() {
        let c = StreamController::new();
        let id = ConversationId::new("c");
        let turn = c.begin(&id).unwrap();
        assert_eq!(c.state(), StreamState::Streaming);
        assert!(!turn.token().is_cancelled());
        let token = turn.token().clone();
        turn.finish();
        assert_eq!(c.state(), StreamState::Idle);
        assert!(!token.is_cancelled());
        assert!(c.begin(&id).is_ok());
    }

    #[test]
    fn second_begin_is_rejected() {
        let c = StreamController::new();
        let id = ConversationId::new("c");
        let _turn = c.begin(&id).unwrap();
        assert!(matches!(c.begin(&id), Err(ChatError::StreamInFlight(_))));
    }

    #[test]
    fn cancel_reaches_the_token_through_a_clone() {
        let c = StreamController::new();
        let turn = c.begin(&ConversationId::new("c")).unwrap();
        let remote = c.clone();
        assert!(remote.cancel());
        assert!(turn.token().is_cancelled());
        assert!(c.is_streaming());
        turn.finish();
        assert!(!remote.is_streaming());
    }

    #[test]
    fn dropped_turn_cancels_and_goes_idle() {
        let c = StreamController::new();
        let turn = c.begin(&ConversationId::new("c")).unwrap();
        let token = turn.token().clone();
        drop(turn);
        assert!(token.is_cancelled());
        assert_eq!(c.state(), StreamState::Idle);
    }

    #[test]
    fn forced_finish_then_stale_turn_leaves_new_turn_alone() {
        let c = StreamController::new();
        let id = ConversationId::new("c");
        let stale = c.begin(&id).unwrap();
        c.finish();
        let fresh = c.begin(&id).unwrap();
        drop(stale);
        assert!(c.is_streaming());
        assert!(!fresh.token().is_cancelled());
        fresh.finish();
        assert!(!c.is_streaming());
    }
}
