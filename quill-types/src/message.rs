//! Chat messages and conversations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ConversationId, MessageId};

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human user.
    User,
    /// The AI assistant.
    Assistant,
    /// A system message.
    System,
}

/// A single message in a conversation.
///
/// `content` only ever grows, and only while an assistant reply is being
/// streamed into it. Everything else is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Opaque message id.
    pub id: MessageId,
    /// Who authored the message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a message with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Create a user message.
    ///
    /// # Example
    ///
    /// ```
    /// use quill_types::{ChatMessage, Role};
    /// let msg = ChatMessage::user("Hi");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Metadata for one conversation. Messages are stored separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Opaque conversation id.
    pub id: ConversationId,
    /// Display title. Empty until back-filled from the first user message.
    #[serde(default)]
    pub title: String,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
    /// When the conversation last changed.
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a conversation with a locally minted id.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_id(ConversationId::generate(), title)
    }

    /// Create a conversation with an id handed out elsewhere.
    #[must_use]
    pub fn with_id(id: ConversationId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Fill an empty title from the text of the first user message.
    ///
    /// Uses the first non-blank line, cut to `max_chars` characters.
    /// Returns `true` if the title changed. A non-empty title is never
    /// overwritten.
    pub fn backfill_title(&mut self, first_user_text: &str, max_chars: usize) -> bool {
        if !self.title.trim().is_empty() {
            return false;
        }
        let line = first_user_text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default();
        if line.is_empty() {
            return false;
        }
        self.title = line.chars().take(max_chars).collect();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn message_uses_camel_case_fields() {
        let msg = ChatMessage::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn backfill_takes_first_non_blank_line() {
        let mut conv = Conversation::new("");
        assert!(conv.backfill_title("\n  How do tags work?\nmore", 30));
        assert_eq!(conv.title, "How do tags work?");
    }

    #[test]
    fn backfill_truncates_by_chars() {
        let mut conv = Conversation::new("");
        conv.backfill_title("你好世界你好世界", 4);
        assert_eq!(conv.title, "你好世界");
    }

    #[test]
    fn backfill_keeps_existing_title() {
        let mut conv = Conversation::new("Pinned");
        assert!(!conv.backfill_title("something else", 30));
        assert_eq!(conv.title, "Pinned");
    }

    #[test]
    fn backfill_ignores_blank_text() {
        let mut conv = Conversation::new("");
        assert!(!conv.backfill_title("   \n ", 30));
        assert!(conv.title.is_empty());
    }
}
