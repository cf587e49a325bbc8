#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

pub mod accumulator;
pub mod controller;
pub mod hook;
pub mod notice;
pub mod session;
pub mod store;

pub use accumulator::MessageAccumulator;
pub use controller::{StreamController, StreamState, StreamTurn};
pub use hook::{SessionEvent, SessionHook, TracingHook};
pub use notice::{Notice, NoticeLevel};
pub use session::{ChatSession, SendOutcome, SessionConfig, StreamStatus, DEFAULT_TITLE_MAX_CHARS};
pub use store::{messages_key, ConversationStore, CONVERSATIONS_KEY, MESSAGES_PREFIX};
