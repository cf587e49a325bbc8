//! Chat client struct and builder.

use std::future::Future;
use std::time::Duration;

use quill_types::{
    ApiEnvelope, ChatError, ChatRequest, ChatStream, ChatTransport, Conversation,
    ConversationId, PayloadFormat, SiteSettings,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{map_http_status, map_reqwest_error};
use crate::guard::ActiveStreams;
use crate::streaming::stream_reply;

const EVENT_STREAM: &str = "text/event-stream";

/// Client for the blog backend's AI chat endpoints.
///
/// Implements [`ChatTransport`] so a conversation view can stream replies
/// through it. Cloning is cheap and clones share the single-stream
/// registry.
///
/// # Example
///
/// ```no_run
/// use quill_client::ChatClient;
/// use quill_types::PayloadFormat;
///
/// let client = ChatClient::new("https://blog.example.com")
///     .auth_token("...")
///     .payload_format(PayloadFormat::Lenient);
/// ```
#[derive(Debug, Clone)]
pub struct ChatClient {
    pub(crate) config: ClientConfig,
    pub(crate) client: reqwest::Client,
    pub(crate) active: ActiveStreams,
}

impl ChatClient {
    /// Create a client for the backend at `base_url` with default paths.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_config(ClientConfig::default()).base_url(base_url)
    }

    /// Create a client from a full configuration.
    #[must_use]
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            active: ActiveStreams::default(),
        }
    }

    /// Override the backend base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Send `Authorization: Bearer <token>` on every request.
    #[must_use]
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth_token = Some(token.into());
        self
    }

    /// Override the chat endpoint path.
    #[must_use]
    pub fn chat_path(mut self, path: impl Into<String>) -> Self {
        self.config.chat_path = path.into();
        self
    }

    /// Choose how stream payloads are decoded.
    #[must_use]
    pub fn payload_format(mut self, format: PayloadFormat) -> Self {
        self.config.payload_format = format;
        self
    }

    /// Deadline for the JSON calls (create conversation, site settings).
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Replace the bearer token, e.g. after a login refresh.
    pub fn set_auth_token(&mut self, token: Option<String>) {
        self.config.auth_token = token;
    }

    /// Whether a reply is currently streaming for `id`.
    pub fn is_streaming(&self, id: &ConversationId) -> bool {
        self.active.contains(id)
    }

    /// Cancel the reply streaming for `id`. Returns whether one was open.
    pub fn cancel(&self, id: &ConversationId) -> bool {
        self.active.cancel(id)
    }

    /// Cancel every open reply stream. Returns how many were open.
    pub fn cancel_all(&self) -> usize {
        self.active.cancel_all()
    }

    /// Fetch the site settings.
    pub async fn fetch_site_settings(&self) -> Result<SiteSettings, ChatError> {
        let url = self.config.url(&self.config.settings_path);
        tracing::debug!(url = %url, "fetching site settings");
        self.send_envelope(self.client.get(&url)).await
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a JSON call and unwrap the envelope it answers with.
    async fn send_envelope<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ChatError> {
        let timeout = self.config.request_timeout;
        let mut builder = self.authorize(builder);
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        if !status.is_success() {
            return Err(map_http_status(status, &text));
        }

        let envelope: ApiEnvelope<T> = serde_json::from_str(&text)
            .map_err(|e| ChatError::InvalidPayload(format!("invalid JSON response: {e}")))?;
        envelope.into_result()
    }
}

impl ChatTransport for ChatClient {
    /// POST the request and hand back the reply as a [`ChatStream`].
    ///
    /// Rejects an empty message, and a conversation that already has a
    /// reply streaming. Cancelling while the connection is still being
    /// established yields an empty stream rather than an error.
    fn open_stream(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<ChatStream, ChatError>> + Send {
        let url = self.config.url(&self.config.chat_path);
        let format = self.config.payload_format;
        let active = self.active.clone();
        let builder = self
            .authorize(self.client.post(&url))
            .header(ACCEPT, EVENT_STREAM)
            .json(&request);

        async move {
            if request.message.trim().is_empty() {
                return Err(ChatError::InvalidRequest("message is empty".into()));
            }
            let guard = active.acquire(&request.conversation_id, &cancel)?;

            tracing::debug!(
                url = %url,
                conversation = %request.conversation_id,
                "sending chat request"
            );

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(conversation = %request.conversation_id, "cancelled before response");
                    return Ok(ChatStream::empty(cancel));
                }
                response = builder.send() => response.map_err(|e| map_reqwest_error(e, None))?,
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(status = status.as_u16(), "chat request rejected");
                return Err(map_http_status(status, &body));
            }
            if response.content_length() == Some(0) {
                return Err(ChatError::MissingBody);
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);

            Ok(stream_reply(
                response,
                content_type.as_deref(),
                format,
                cancel,
                guard,
            ))
        }
    }

    /// POST `{ "title": ... }` to the conversations endpoint.
    fn create_conversation(
        &self,
        title: &str,
    ) -> impl Future<Output = Result<Conversation, ChatError>> + Send {
        let url = self.config.url(&self.config.conversations_path);
        let builder = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "title": title }));
        async move {
            tracing::debug!(url = %url, "creating conversation");
            self.send_envelope(builder).await
        }
    }
}
