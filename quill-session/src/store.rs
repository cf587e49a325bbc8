//! Conversations and messages on top of a [`StateStore`].

use std::sync::Arc;

use quill_types::{ChatError, ChatMessage, Conversation, ConversationId, StateError, StateStore};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

/// Key holding the JSON array of all conversations.
pub const CONVERSATIONS_KEY: &str = "chat:conversations";

/// Prefix of the per-conversation message keys.
pub const MESSAGES_PREFIX: &str = "chat:messages:";

/// Key holding the messages of `id`.
pub fn messages_key(id: &ConversationId) -> String {
    format!("{MESSAGES_PREFIX}{id}")
}

/// Typed access to the chat keys of a [`StateStore`].
///
/// Clones share the store and the lock that serializes read-modify-write
/// updates of the conversation list.
#[derive(Clone)]
pub struct ConversationStore {
    store: Arc<dyn StateStore>,
    list_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore").finish_non_exhaustive()
    }
}

impl ConversationStore {
    /// Wrap a store.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            list_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The underlying key-value store.
    pub fn inner(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    async fn read_array<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, ChatError> {
        match self.store.read(key).await? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| ChatError::from(StateError::Serialization(format!("{key}: {e}")))),
            None => Ok(Vec::new()),
        }
    }

    async fn write_json<T: serde::Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), ChatError> {
        let value =
            serde_json::to_value(value).map_err(|e| StateError::Serialization(e.to_string()))?;
        self.store.write(key, value).await?;
        Ok(())
    }

    /// All conversations, most recently updated first.
    pub async fn load_conversations(&self) -> Result<Vec<Conversation>, ChatError> {
        let mut list: Vec<Conversation> = self.read_array(CONVERSATIONS_KEY).await?;
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(list)
    }

    /// One conversation by id.
    pub async fn find_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, ChatError> {
        let list: Vec<Conversation> = self.read_array(CONVERSATIONS_KEY).await?;
        Ok(list.into_iter().find(|c| &c.id == id))
    }

    /// Insert `conversation`, or replace the stored one with the same id.
    pub async fn upsert_conversation(&self, conversation: &Conversation) -> Result<(), ChatError> {
        let _guard = self.list_lock.lock().await;
        let mut list: Vec<Conversation> = self.read_array(CONVERSATIONS_KEY).await?;
        match list.iter_mut().find(|c| c.id == conversation.id) {
            Some(existing) => *existing = conversation.clone(),
            None => list.push(conversation.clone()),
        }
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        self.write_json(CONVERSATIONS_KEY, &list).await
    }

    /// Messages of `id`, in order. Empty when none were saved.
    pub async fn load_messages(&self, id: &ConversationId) -> Result<Vec<ChatMessage>, ChatError> {
        self.read_array(&messages_key(id)).await
    }

    /// Replace the stored messages of `id`.
    pub async fn save_messages(
        &self,
        id: &ConversationId,
        messages: &[ChatMessage],
    ) -> Result<(), ChatError> {
        self.write_json(&messages_key(id), messages).await
    }

    /// Remove a conversation and its messages. Returns whether it existed.
    pub async fn delete_conversation(&self, id: &ConversationId) -> Result<bool, ChatError> {
        let _guard = self.list_lock.lock().await;
        let mut list: Vec<Conversation> = self.read_array(CONVERSATIONS_KEY).await?;
        let before = list.len();
        list.retain(|c| &c.id != id);
        let existed = list.len() != before;
        if existed {
            self.write_json(CONVERSATIONS_KEY, &list).await?;
        }
        self.store.delete(&messages_key(id)).await?;
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_key_embeds_the_id() {
        assert_eq!(messages_key(&ConversationId::new("abc")), "chat:messages:abc");
    }
}
