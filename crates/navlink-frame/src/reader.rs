use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::debug;

use crate::codec::{Frame, FrameCodec};
use crate::config::FrameConfig;
use crate::error::{FrameError, Result};
use crate::machine::FrameStats;

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete frames from any `Read` source.
///
/// Corrupt or partial frames are skipped and counted; callers only ever see
/// verified frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    codec: FrameCodec,
}

impl<T: Read> FrameReader<T> {
    /// Create a frame reader around an existing codec.
    pub fn new(inner: T, codec: FrameCodec) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            codec,
        }
    }

    /// Create a frame reader for `config`.
    pub fn with_config(inner: T, config: FrameConfig) -> Result<Self> {
        Ok(Self::new(inner, FrameCodec::new(config)?))
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::EndOfStream)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.codec.decode_from(&mut self.buf) {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                debug!(stats = ?self.codec.stats(), "end of frame stream");
                return Err(FrameError::EndOfStream);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Receive statistics accumulated so far.
    pub fn stats(&self) -> FrameStats {
        self.codec.stats()
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner source.
    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    /// Frame configuration in use.
    pub fn config(&self) -> &FrameConfig {
        self.codec.config()
    }
}
