//! Onboard log stream.
//!
//! One record per frame: a start marker, a 16-bit length and a payload that
//! begins with the 16-bit record type. No sequence id, checksum or stop
//! marker; the log medium is trusted.

mod records;

use std::io::{Read, Write};

use navlink_frame::{FieldWidth, FrameConfig, FrameError, FrameReader, FrameStats, FrameWriter};
use tracing::{debug, warn};

pub use records::*;

use crate::error::{ProtocolError, Result};

pub const START_MARKER: u8 = 0xAA;
pub const MAX_FRAME_LEN: usize = 1024;

/// Frame configuration of the log stream.
pub fn config() -> FrameConfig {
    FrameConfig {
        use_start_marker: true,
        length_width: FieldWidth::U16,
        max_frame_len: MAX_FRAME_LEN,
        start_marker: START_MARKER,
        ..FrameConfig::default()
    }
}

/// Writes log records, one per frame.
pub struct LogWriter<W> {
    writer: FrameWriter<W>,
}

impl<W: Write> LogWriter<W> {
    pub fn new(inner: W) -> Result<Self> {
        Ok(Self {
            writer: FrameWriter::with_config(inner, config())?,
        })
    }

    /// Encode `record` straight into the outgoing frame and send it.
    pub fn write_record(&mut self, record: &LogRecord) -> Result<()> {
        let max = self.writer.max_payload_len();
        let len = record.encoded_len(max);
        if len > max {
            return Err(FrameError::PayloadTooLarge { size: len, max }.into());
        }
        // Cannot fail once the length fits.
        self.writer
            .send_with(|area| record.encode(area).unwrap_or_default())?;
        Ok(())
    }

    /// Log a text message. Empty text writes nothing.
    pub fn message(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.write_record(&LogRecord::MessageDump(MessageDump {
            text: text.to_owned(),
        }))
    }

    /// Write a frame-filling counting pattern.
    pub fn debug_pattern(&mut self) -> Result<()> {
        self.write_record(&LogRecord::DebugPattern(DebugPattern::default()))
    }

    pub fn max_payload_len(&self) -> usize {
        self.writer.max_payload_len()
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

/// Reads log records from a stored log.
pub struct LogReader<R> {
    reader: FrameReader<R>,
    skipped: u32,
}

impl<R: Read> LogReader<R> {
    pub fn new(inner: R) -> Result<Self> {
        Ok(Self {
            reader: FrameReader::with_config(inner, config())?,
            skipped: 0,
        })
    }

    /// Read the next record (blocking).
    ///
    /// Frames holding an unknown record type or a truncated record are
    /// counted and skipped. Fails with [`FrameError::EndOfStream`] at EOF.
    pub fn read_record(&mut self) -> Result<LogRecord> {
        loop {
            let frame = self.reader.read_frame()?;
            match LogRecord::decode(&frame.payload) {
                Ok(record) => return Ok(record),
                Err(err @ (ProtocolError::UnknownRecord(_) | ProtocolError::Frame(_))) => {
                    self.skipped = self.skipped.wrapping_add(1);
                    warn!(error = %err, len = frame.payload.len(), "skipping log frame");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Frame-level statistics.
    pub fn stats(&self) -> FrameStats {
        self.reader.stats()
    }

    /// Frames that framed correctly but held no decodable record.
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

impl<R: Read> Iterator for LogReader<R> {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_record() {
            Err(err) if err.is_end_of_stream() => {
                debug!(stats = ?self.stats(), skipped = self.skipped, "end of log");
                None
            }
            other => Some(other),
        }
    }
}
