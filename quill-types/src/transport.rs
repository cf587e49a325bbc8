//! The seam between a conversation view and the backend.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ChatError;
use crate::id::ConversationId;
use crate::message::Conversation;
use crate::stream::ChatStream;

/// Body of a chat-completion request.
///
/// Serializes as `{"message": ..., "conversationId": ..., ...extra}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's message text.
    pub message: String,
    /// The conversation the reply belongs to.
    pub conversation_id: ConversationId,
    /// Additional fields forwarded verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatRequest {
    /// A request with no extra fields.
    #[must_use]
    pub fn new(message: impl Into<String>, conversation_id: ConversationId) -> Self {
        Self {
            message: message.into(),
            conversation_id,
            extra: serde_json::Map::new(),
        }
    }

    /// Add a field to the request body.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Something that can stream an assistant reply for a chat request.
///
/// `quill-client` implements this over HTTP; tests implement it with
/// scripted events.
pub trait ChatTransport: Send + Sync {
    /// Open a reply stream.
    ///
    /// The returned stream must stop promptly, without an error event,
    /// once `cancel` fires. Implementations reject a second open for a
    /// conversation that is still streaming with
    /// [`ChatError::StreamInFlight`].
    fn open_stream(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<ChatStream, ChatError>> + Send;

    /// Create a conversation on the backend.
    fn create_conversation(
        &self,
        title: &str,
    ) -> impl Future<Output = Result<Conversation, ChatError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_camel_case_with_extras() {
        let req = ChatRequest::new("hello", ConversationId::new("c1"))
            .with_extra("articleId", serde_json::json!(42));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "hello", "conversationId": "c1", "articleId": 42})
        );
    }
}
