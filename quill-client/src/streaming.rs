//! Turning a chat response into a [`ChatStream`].

use futures::StreamExt;
use quill_sse::{decode_payload, event_stream, is_event_stream, is_json};
use quill_types::{
    ApiEnvelope, ChatStream, Framing, PayloadFormat, StreamError, StreamEvent,
};
use reqwest::Response;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::guard::ActiveStreamGuard;

/// Wrap an HTTP response into a [`ChatStream`].
///
/// The content type picks the reading strategy: `application/json` is a
/// single envelope, `text/event-stream` is framed, anything else is raw
/// chunked text. The guard lives inside the stream, so the conversation's
/// slot frees up when the stream finishes or is dropped.
pub(crate) fn stream_reply(
    response: Response,
    content_type: Option<&str>,
    format: PayloadFormat,
    cancel: CancellationToken,
    guard: ActiveStreamGuard,
) -> ChatStream {
    if is_json(content_type) {
        let events = envelope_reply(response, format, cancel.clone(), guard);
        return ChatStream::new(events, cancel);
    }

    let framing = if is_event_stream(content_type) {
        Framing::EventStream
    } else {
        Framing::Raw
    };
    tracing::debug!(?framing, "quill.stream.opened");

    let inner = event_stream(response.bytes_stream(), framing, format, cancel.clone());
    let events = async_stream::stream! {
        let _guard = guard;
        let mut inner = std::pin::pin!(inner);
        while let Some(event) = inner.next().await {
            yield event;
        }
    };
    ChatStream::new(events, cancel)
}

/// Read a whole `{ code, data, message }` body and replay it as one delta.
fn envelope_reply(
    response: Response,
    format: PayloadFormat,
    cancel: CancellationToken,
    guard: ActiveStreamGuard,
) -> impl futures::Stream<Item = StreamEvent> + Send + 'static {
    async_stream::stream! {
        let _guard = guard;

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            body = response.text() => body,
        };
        let body = match body {
            Ok(b) => b,
            Err(e) => {
                yield StreamEvent::Error(StreamError::retryable(format!("stream read error: {e}")));
                return;
            }
        };

        let data = serde_json::from_str::<ApiEnvelope<Value>>(&body)
            .map_err(|e| StreamError::non_retryable(format!("invalid JSON response: {e}")))
            .and_then(|env| env.into_result().map_err(StreamError::from));
        let text = match data {
            Ok(Value::String(s)) => Ok(s),
            Ok(other) => decode_payload(&other.to_string(), format).map_err(StreamError::from),
            Err(e) => Err(e),
        };

        match text {
            Ok(text) => {
                if !text.is_empty() {
                    yield StreamEvent::TextDelta(text);
                }
                yield StreamEvent::Done;
            }
            Err(e) => {
                tracing::warn!(error = %e, "quill.stream.envelope_failed");
                yield StreamEvent::Error(e);
            }
        }
    }
}
