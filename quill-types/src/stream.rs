//! Streaming event types for incremental chat replies.

use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::StreamError;

/// An event emitted while a reply streams in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental text to append to the open assistant message.
    TextDelta(String),
    /// The byte stream ended normally.
    Done,
    /// The stream failed. No further events follow.
    Error(StreamError),
}

/// Handle to an open chat stream.
///
/// The stream ends without an error event when `cancel` is triggered.
pub struct ChatStream {
    /// The stream of events. Consume with `StreamExt::next()`.
    pub receiver: Pin<Box<dyn Stream<Item = StreamEvent> + Send>>,
    /// Token observed by the read loop.
    pub cancel: CancellationToken,
}

impl ChatStream {
    /// Wrap an event stream together with the token that stops it.
    pub fn new(
        receiver: impl Stream<Item = StreamEvent> + Send + 'static,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            receiver: Box::pin(receiver),
            cancel,
        }
    }

    /// A stream that yields nothing, used when cancellation wins the race
    /// against opening the connection.
    pub fn empty(cancel: CancellationToken) -> Self {
        Self::new(futures::stream::empty(), cancel)
    }
}

impl fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// How the response body is split into payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `text/event-stream`: blank-line delimited frames of `data:` lines.
    EventStream,
    /// Anything else: every decoded chunk is a payload on its own.
    Raw,
}

/// How a payload's text is interpreted once extracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// A JSON string or an object with a string `content` field. Any
    /// other JSON shape is an error. Non-JSON text is used as-is.
    #[default]
    Strict,
    /// Try the known content fields in turn and fall back to the raw
    /// text when nothing matches.
    Lenient,
}

impl FromStr for PayloadFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!("unknown payload format: {other}")),
        }
    }
}
