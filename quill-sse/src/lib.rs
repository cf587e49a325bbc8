#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

pub mod decode;
pub mod frame;
pub mod parser;
pub mod payload;
pub mod stream;

pub use decode::Utf8Decoder;
pub use frame::FrameSplitter;
pub use parser::EventStreamParser;
pub use payload::{
    DONE_SENTINEL, RawExtractor, decode_payload, extract_frame, extract_raw, is_event_stream,
    is_json,
};
pub use stream::event_stream;
