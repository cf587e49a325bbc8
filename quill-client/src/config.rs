//! Client configuration and its environment-variable loader.

use std::time::Duration;

use quill_types::{ChatError, PayloadFormat};

/// Environment variable holding the backend base URL.
pub const ENV_BASE_URL: &str = "QUILL_BASE_URL";
/// Environment variable holding the bearer token.
pub const ENV_AUTH_TOKEN: &str = "QUILL_AUTH_TOKEN";
/// Environment variable overriding the chat endpoint path.
pub const ENV_CHAT_PATH: &str = "QUILL_CHAT_PATH";
/// Environment variable selecting `strict` or `lenient` payload decoding.
pub const ENV_PAYLOAD_FORMAT: &str = "QUILL_PAYLOAD_FORMAT";
/// Environment variable with a timeout, in seconds, for non-streaming calls.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "QUILL_REQUEST_TIMEOUT_SECS";

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_CHAT_PATH: &str = "/api/ai/chat";
const DEFAULT_CONVERSATIONS_PATH: &str = "/api/ai/conversations";
const DEFAULT_SETTINGS_PATH: &str = "/api/settings";

/// Everything [`ChatClient`](crate::ChatClient) needs to reach the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend base URL, without a trailing slash.
    pub base_url: String,
    /// Path of the streaming chat endpoint.
    pub chat_path: String,
    /// Path of the create-conversation endpoint.
    pub conversations_path: String,
    /// Path of the site-settings endpoint.
    pub settings_path: String,
    /// Bearer token sent as `Authorization` on every request.
    pub auth_token: Option<String>,
    /// How stream payloads are decoded.
    pub payload_format: PayloadFormat,
    /// Deadline for the JSON calls. Reply streams never get one: they
    /// run until the backend closes them or the caller cancels.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            chat_path: DEFAULT_CHAT_PATH.into(),
            conversations_path: DEFAULT_CONVERSATIONS_PATH.into(),
            settings_path: DEFAULT_SETTINGS_PATH.into(),
            auth_token: None,
            payload_format: PayloadFormat::default(),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Load from `QUILL_*` environment variables, defaulting what is unset.
    pub fn from_env() -> Result<Self, ChatError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ChatError> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(token) = lookup(ENV_AUTH_TOKEN).filter(|v| !v.trim().is_empty()) {
            config.auth_token = Some(token.trim().to_string());
        }
        if let Some(path) = lookup(ENV_CHAT_PATH).filter(|v| !v.trim().is_empty()) {
            config.chat_path = path.trim().to_string();
        }
        if let Some(format) = lookup(ENV_PAYLOAD_FORMAT) {
            config.payload_format = format
                .parse()
                .map_err(|e: String| ChatError::Config(format!("{ENV_PAYLOAD_FORMAT}: {e}")))?;
        }
        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|e| {
                ChatError::Config(format!("{ENV_REQUEST_TIMEOUT_SECS}: {e}"))
            })?;
            config.request_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
