//! Wire protocol for kiln.
//!
//! Defines the framing and message types exchanged between two scopes when
//! importing (fetch) and exporting (put) component objects. The protocol runs
//! over any reliable byte stream; authentication belongs to the stream.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::KilnCodec;
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    error_codes, FetchItem, KilnMessage, PutResult, RejectReason, MAX_MESSAGE_SIZE,
    PROTOCOL_VERSION,
};
