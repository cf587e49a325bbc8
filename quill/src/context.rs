//! The application context the chat view runs in.
//!
//! Holds what the rest of the app would otherwise reach for through
//! globals: the configured client, the cached site settings and the
//! conversation store. Build one with [`AppContext::init`], pass it to
//! whatever needs it, and call [`AppContext::teardown`] on logout or
//! shutdown.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use quill_client::{ChatClient, ClientConfig};
use quill_session::{ChatSession, ConversationStore, SessionConfig};
use quill_state_memory::MemoryStore;
use quill_types::{ChatError, ConversationId, SiteSettings, StateStore};

/// Environment variable naming the directory for persisted conversations.
/// Conversations live in memory when it is unset.
pub const ENV_STATE_DIR: &str = "QUILL_STATE_DIR";

/// Everything [`AppContext::init`] needs.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// How to reach the backend.
    pub client: ClientConfig,
    /// How sessions create and name conversations.
    pub session: SessionConfig,
    /// Where to persist conversations. `None` keeps them in memory.
    pub state_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load from `QUILL_*` environment variables.
    pub fn from_env() -> Result<Self, ChatError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ChatError> {
        let client = ClientConfig::from_lookup(&lookup)?;
        let state_dir = lookup(ENV_STATE_DIR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Ok(Self {
            client,
            session: SessionConfig::default(),
            state_dir,
        })
    }
}

/// Shared application state with an explicit lifecycle.
pub struct AppContext {
    client: Arc<ChatClient>,
    store: ConversationStore,
    session_config: SessionConfig,
    settings: RwLock<SiteSettings>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("base_url", &self.client.config().base_url)
            .field("session_config", &self.session_config)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Build the context and fetch the site settings once.
    ///
    /// A settings fetch failure is logged and leaves the defaults in
    /// place, so the site still comes up with the backend unreachable.
    /// Opening the state directory is not optional and fails `init`.
    pub async fn init(config: AppConfig) -> Result<Self, ChatError> {
        let store = open_store(config.state_dir.as_deref())?;
        let client = Arc::new(ChatClient::from_config(config.client));
        let context = Self::with_parts(client, store, config.session);

        if let Err(e) = context.refresh().await {
            tracing::warn!(error = %e, "site settings unavailable, using defaults");
        }
        tracing::info!(base_url = %context.client.config().base_url, "quill.context.init");
        Ok(context)
    }

    /// Assemble a context from ready-made parts without any I/O.
    pub fn with_parts(
        client: Arc<ChatClient>,
        store: Arc<dyn StateStore>,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            client,
            store: ConversationStore::new(store),
            session_config,
            settings: RwLock::new(SiteSettings::default()),
        }
    }

    /// Re-fetch the site settings. The cache is left untouched on error.
    pub async fn refresh(&self) -> Result<SiteSettings, ChatError> {
        let settings = self.client.fetch_site_settings().await?;
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings.clone();
        tracing::debug!(chat_enabled = settings.chat_enabled, "site settings refreshed");
        Ok(settings)
    }

    /// The cached site settings.
    pub fn site_settings(&self) -> SiteSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The shared chat client.
    pub fn client(&self) -> &Arc<ChatClient> {
        &self.client
    }

    /// The conversation store.
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    fn ensure_chat_enabled(&self) -> Result<(), ChatError> {
        if self.site_settings().chat_enabled {
            Ok(())
        } else {
            Err(ChatError::InvalidRequest(
                "chat is disabled for this site".into(),
            ))
        }
    }

    /// Start a new conversation.
    pub async fn new_session(&self, title: &str) -> Result<ChatSession<ChatClient>, ChatError> {
        self.ensure_chat_enabled()?;
        ChatSession::create(
            Arc::clone(&self.client),
            self.store.clone(),
            self.session_config.clone(),
            title,
        )
        .await
    }

    /// Reopen a stored conversation.
    pub async fn open_session(
        &self,
        id: &ConversationId,
    ) -> Result<ChatSession<ChatClient>, ChatError> {
        self.ensure_chat_enabled()?;
        ChatSession::open(
            Arc::clone(&self.client),
            self.store.clone(),
            self.session_config.clone(),
            id,
        )
        .await
    }

    /// Cancel every reply still streaming and drop the context.
    ///
    /// Returns how many streams were cancelled.
    pub fn teardown(self) -> usize {
        let cancelled = self.client.cancel_all();
        tracing::info!(cancelled, "quill.context.teardown");
        cancelled
    }
}

fn open_store(dir: Option<&Path>) -> Result<Arc<dyn StateStore>, ChatError> {
    match dir {
        None => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "state-fs")]
        Some(dir) => {
            tracing::debug!(dir = %dir.display(), "persisting conversations on disk");
            Ok(Arc::new(quill_state_fs::FsStore::new(dir)))
        }
        #[cfg(not(feature = "state-fs"))]
        Some(dir) => Err(ChatError::Config(format!(
            "{ENV_STATE_DIR}={} requires the state-fs feature",
            dir.display()
        ))),
    }
}
