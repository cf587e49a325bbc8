#![deny(missing_docs)]
//! # quill: umbrella crate
//!
//! Single import surface for quill's streaming chat. Re-exports the
//! member crates behind feature flags, plus a `prelude` for the common
//! path and, with `app`, the [`AppContext`](context::AppContext).

pub use quill_types;

#[cfg(feature = "client")]
pub use quill_client;
#[cfg(feature = "session")]
pub use quill_session;
#[cfg(feature = "sse")]
pub use quill_sse;
#[cfg(feature = "state-fs")]
pub use quill_state_fs;
#[cfg(feature = "state-memory")]
pub use quill_state_memory;

#[cfg(feature = "app")]
pub mod context;

/// Common imports for building a chat view.
pub mod prelude {
    pub use quill_types::{
        ChatError, ChatMessage, ChatRequest, ChatStream, ChatTransport, Conversation,
        ConversationId, PayloadFormat, Role, SiteSettings, StateStore, StreamEvent,
    };

    #[cfg(feature = "client")]
    pub use quill_client::{ChatClient, ClientConfig};

    #[cfg(feature = "session")]
    pub use quill_session::{
        ChatSession, ConversationStore, Notice, NoticeLevel, SendOutcome, SessionConfig,
        SessionEvent, SessionHook, StreamController, StreamStatus, TracingHook,
    };

    #[cfg(feature = "state-memory")]
    pub use quill_state_memory::MemoryStore;

    #[cfg(feature = "state-fs")]
    pub use quill_state_fs::FsStore;

    #[cfg(feature = "app")]
    pub use crate::context::{AppConfig, AppContext};
}
