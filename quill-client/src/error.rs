//! Internal error helpers for mapping HTTP/reqwest errors to [`ChatError`].

use std::time::Duration;

use quill_types::{ApiEnvelope, ChatError};

/// Map a non-success HTTP status to [`ChatError::Status`].
///
/// The message carries the reason phrase, followed by the envelope's
/// `message` when the body is one, or the trimmed body text otherwise.
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> ChatError {
    let reason = status.canonical_reason().unwrap_or("Unknown Status");
    let detail = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body)
        .ok()
        .and_then(|env| env.message)
        .unwrap_or_else(|| body.trim().to_string());

    let message = if detail.is_empty() {
        reason.to_string()
    } else {
        format!("{reason}: {detail}")
    };

    ChatError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Map a [`reqwest::Error`] to a [`ChatError`].
///
/// `timeout` is the deadline that was configured for the request, if any.
pub(crate) fn map_reqwest_error(err: reqwest::Error, timeout: Option<Duration>) -> ChatError {
    if err.is_timeout() {
        ChatError::Timeout(timeout.unwrap_or_default())
    } else {
        ChatError::Network(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn status_with_plain_body() {
        let err = map_http_status(StatusCode::BAD_GATEWAY, "upstream down\n");
        match err {
            ChatError::Status { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway: upstream down");
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[test]
    fn status_with_envelope_body_uses_its_message() {
        let err = map_http_status(
            StatusCode::UNAUTHORIZED,
            r#"{"code":401,"data":null,"message":"token expired"}"#,
        );
        assert_eq!(err.to_string(), "HTTP 401: Unauthorized: token expired");
    }

    #[test]
    fn status_with_empty_body() {
        let err = map_http_status(StatusCode::NOT_FOUND, "");
        assert_eq!(err.to_string(), "HTTP 404: Not Found");
    }
}
