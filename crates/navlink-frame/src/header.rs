//! Sub-message headers.
//!
//! A frame payload carries consecutive sub-messages, each prefixed by an
//! `{id, len}` header where `len` counts the whole sub-message, header
//! included. Records either have a static body size ([`FixedMessage`]) or a
//! runtime one (see [`variable_message_len`]).

use crate::config::FieldWidth;
use crate::error::{FrameError, Result};

/// Widths of the `{id, len}` header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLayout {
    pub id_width: FieldWidth,
    pub len_width: FieldWidth,
}

impl MessageLayout {
    pub const fn new(id_width: FieldWidth, len_width: FieldWidth) -> Self {
        Self { id_width, len_width }
    }

    /// Size of the `{id, len}` header in bytes.
    pub const fn header_len(&self) -> usize {
        self.id_width.bytes() + self.len_width.bytes()
    }

    /// Largest body a single sub-message can carry.
    pub const fn max_body_len(&self) -> usize {
        self.len_width.max_value() as usize - self.header_len()
    }

    /// Decode the header at the start of `src`, if enough bytes are present.
    pub fn read_header(&self, src: &[u8]) -> Option<MessageHeader> {
        if src.len() < self.header_len() {
            return None;
        }
        let id = self.id_width.read(src);
        let len = self.len_width.read(&src[self.id_width.bytes()..]) as usize;
        Some(MessageHeader { id, len })
    }

    /// Encode `header` at the start of `dst`.
    pub fn write_header(&self, header: MessageHeader, dst: &mut [u8]) -> Result<()> {
        if header.len > self.len_width.max_value() as usize {
            return Err(FrameError::MessageTooLarge {
                size: header.len.saturating_sub(self.header_len()),
                max: self.max_body_len(),
            });
        }
        if dst.len() < self.header_len() {
            return Err(FrameError::Truncated {
                needed: self.header_len(),
                available: dst.len(),
            });
        }
        self.id_width.write(header.id, dst);
        self.len_width
            .write(header.len as u32, &mut dst[self.id_width.bytes()..]);
        Ok(())
    }
}

/// Decoded sub-message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub id: u32,
    /// Whole sub-message length, header included.
    pub len: usize,
}

/// A record that travels as a sub-message body.
pub trait Message: Sized {
    /// Sub-message id.
    const ID: u32;

    /// Encoded body size in bytes.
    fn body_len(&self) -> usize;

    /// Write the body into `dst`, which is exactly `body_len()` bytes.
    fn encode_body(&self, dst: &mut [u8]);

    /// Read the body from `src`.
    fn decode_body(src: &[u8]) -> Result<Self>;
}

/// A record whose body size is known statically.
pub trait FixedMessage: Message {
    const BODY_LEN: usize;
}

/// Whole sub-message length of a fixed-size record.
pub fn fixed_message_len<M: FixedMessage>(layout: &MessageLayout) -> usize {
    layout.header_len() + M::BODY_LEN
}

/// Whole sub-message length for a body of `payload_len` bytes.
pub fn variable_message_len(layout: &MessageLayout, payload_len: usize) -> usize {
    layout.header_len() + payload_len
}

/// Fail with [`FrameError::Truncated`] if `src` is shorter than `needed`.
pub fn ensure_len(src: &[u8], needed: usize) -> Result<()> {
    if src.len() < needed {
        return Err(FrameError::Truncated {
            needed,
            available: src.len(),
        });
    }
    Ok(())
}
