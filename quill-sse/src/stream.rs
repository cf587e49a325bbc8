//! The async read loop: response bytes in, [`StreamEvent`]s out.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use quill_types::{Framing, PayloadFormat, StreamError, StreamEvent};
use tokio_util::sync::CancellationToken;

use crate::parser::EventStreamParser;

/// Parse a body byte stream into [`StreamEvent`]s.
///
/// Chunks are awaited one at a time. The loop races every read against
/// `cancel`; once cancellation is observed the stream ends without an
/// error event and without emitting anything further. A read failure or a
/// rejected payload yields one [`StreamEvent::Error`] and ends the stream.
/// A body that runs to completion ends with [`StreamEvent::Done`].
pub fn event_stream<S, E>(
    byte_stream: S,
    framing: Framing,
    format: PayloadFormat,
    cancel: CancellationToken,
) -> impl Stream<Item = StreamEvent> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let mut parser = EventStreamParser::new(framing, format);
        let mut bytes_stream = std::pin::pin!(byte_stream);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("quill.stream.cancelled");
                    return;
                }
                next = bytes_stream.next() => next,
            };

            let Some(chunk_result) = next else {
                break;
            };

            let chunk = match chunk_result {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = %e, "quill.stream.read_failed");
                    yield StreamEvent::Error(StreamError::retryable(format!("stream read error: {e}")));
                    return;
                }
            };

            let mut payloads = Vec::new();
            let fed = parser.feed_into(&chunk, &mut payloads);
            for payload in payloads {
                if cancel.is_cancelled() {
                    return;
                }
                yield StreamEvent::TextDelta(payload);
            }
            if let Err(e) = fed {
                tracing::warn!(error = %e, "quill.stream.bad_payload");
                yield StreamEvent::Error(e.into());
                return;
            }
        }

        // End of body: flush the trailing partial frame.
        let mut payloads = Vec::new();
        let flushed = parser.finish_into(&mut payloads);
        for payload in payloads {
            if cancel.is_cancelled() {
                return;
            }
            yield StreamEvent::TextDelta(payload);
        }
        if let Err(e) = flushed {
            tracing::warn!(error = %e, "quill.stream.bad_payload");
            yield StreamEvent::Error(e.into());
            return;
        }

        yield StreamEvent::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: Vec<&'static str>) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send {
        futures::stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))))
    }

    #[tokio::test]
    async fn emits_deltas_then_done() {
        let events: Vec<StreamEvent> = event_stream(
            chunks(vec!["data: a\n\n", "data: b\n\n"]),
            Framing::EventStream,
            PayloadFormat::Strict,
            CancellationToken::new(),
        )
        .collect()
        .await;
        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("a".into()),
                StreamEvent::TextDelta("b".into()),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn read_error_ends_stream() {
        let body = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"data: a\n\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"data: never\n\n")),
        ]);
        let events: Vec<StreamEvent> = event_stream(
            body,
            Framing::EventStream,
            PayloadFormat::Strict,
            CancellationToken::new(),
        )
        .collect()
        .await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], StreamEvent::Error(e) if e.is_retryable));
    }

    #[tokio::test]
    async fn pre_cancelled_stream_is_silent() {
        let token = CancellationToken::new();
        token.cancel();
        let events: Vec<StreamEvent> = event_stream(
            chunks(vec!["data: a\n\n"]),
            Framing::EventStream,
            PayloadFormat::Strict,
            token,
        )
        .collect()
        .await;
        assert!(events.is_empty());
    }
}
