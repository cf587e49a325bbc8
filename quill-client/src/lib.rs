#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

pub mod client;
pub mod config;
pub(crate) mod error;
pub(crate) mod guard;
pub(crate) mod streaming;

pub use client::ChatClient;
pub use config::ClientConfig;

// Re-export quill-types for convenience
pub use quill_types::{
    ChatError, ChatRequest, ChatStream, ChatTransport, PayloadFormat, StreamEvent,
};
