//! Binary framing for unreliable serial links.
//!
//! A [`FrameMachine`] turns a raw byte stream into verified frames one byte at
//! a time, resynchronizing after corruption:
//! - optional start and stop marker bytes
//! - a little-endian length field and optional sequence id
//! - an optional CRC or Fletcher checksum, with zero padding to the
//!   checksum's word size
//!
//! [`PacketHandler`] packs several `{id, len}`-headed sub-messages into one
//! frame. [`FrameReader`], [`FrameWriter`] and [`FrameCodec`] adapt both to
//! blocking streams and (with the `async` feature) `tokio_util` codecs.

pub mod codec;
pub mod config;
pub mod error;
pub mod header;
pub mod machine;
pub mod packet;
pub mod reader;
pub mod verify;
pub mod writer;

pub use codec::{Frame, FrameCodec};
pub use config::{FieldWidth, FrameConfig};
pub use error::{FrameError, Result};
pub use header::{
    ensure_len, fixed_message_len, variable_message_len, FixedMessage, Message, MessageHeader,
    MessageLayout,
};
pub use machine::{FrameMachine, FrameStats, ParseState};
pub use packet::{Messages, PacketHandler};
pub use reader::FrameReader;
pub use verify::{Crc, Fletcher, FletcherWidth, Verifier, VerifierKind};
pub use writer::FrameWriter;
