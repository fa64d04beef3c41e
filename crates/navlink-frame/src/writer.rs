use std::io::{ErrorKind, Write};

use tracing::debug;

use crate::config::FrameConfig;
use crate::error::{FrameError, Result};
use crate::machine::FrameMachine;
use crate::packet::PacketHandler;

/// Writes complete frames to any `Write` sink.
///
/// Every frame is written in full and followed by a flush.
pub struct FrameWriter<T> {
    inner: T,
    machine: FrameMachine,
}

impl<T: Write> FrameWriter<T> {
    /// Create a frame writer around an existing transmit machine.
    pub fn new(inner: T, machine: FrameMachine) -> Self {
        Self { inner, machine }
    }

    /// Create a frame writer for `config`.
    pub fn with_config(inner: T, config: FrameConfig) -> Result<Self> {
        Ok(Self::new(inner, FrameMachine::new(config)?))
    }

    /// Frame and send `payload`.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        let max = self.machine.max_payload_len();
        if payload.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }
        self.machine.payload_mut()[..payload.len()].copy_from_slice(payload);
        self.machine.prepare_packet(payload.len())?;
        write_all(&mut self.inner, self.machine.packet())?;
        self.flush()
    }

    /// Frame and send a payload written in place by `fill`, which returns the
    /// number of bytes it wrote.
    pub fn send_with<F>(&mut self, fill: F) -> Result<()>
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        let len = fill(self.machine.payload_mut());
        self.machine.prepare_packet(len)?;
        write_all(&mut self.inner, self.machine.packet())?;
        self.flush()
    }

    /// Frame the sub-messages accumulated in `packets` and send them.
    pub fn write_packet(&mut self, packets: &mut PacketHandler) -> Result<()> {
        let len = packets.prepare_packet()?;
        debug!(len, "writing multi-message packet");
        write_all(&mut self.inner, packets.packet())?;
        self.flush()
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Largest payload [`FrameWriter::send`] accepts.
    pub fn max_payload_len(&self) -> usize {
        self.machine.max_payload_len()
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner sink.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Frame configuration in use.
    pub fn config(&self) -> &FrameConfig {
        self.machine.config()
    }
}

fn write_all<T: Write>(inner: &mut T, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match inner.write(&bytes[offset..]) {
            Ok(0) => return Err(FrameError::EndOfStream),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}
