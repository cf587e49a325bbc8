#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

pub mod envelope;
pub mod error;
pub mod id;
pub mod message;
pub mod settings;
pub mod state;
pub mod stream;
pub mod transport;

pub use envelope::*;
pub use error::*;
pub use id::*;
pub use message::*;
pub use settings::*;
pub use state::*;
pub use stream::*;
pub use transport::*;
