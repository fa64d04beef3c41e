use tracing::{debug, trace};

use crate::config::{FrameConfig, FrameLayout};
use crate::error::{FrameError, Result};
use crate::verify::Verifier;

/// Receive state of a [`FrameMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    StartMarker,
    Length,
    SequenceId,
    Payload,
    Verification,
    StopMarker,
}

/// Resynchronization counters.
///
/// Kept across [`FrameMachine::clear`], reset by [`FrameMachine::init`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Bytes discarded while hunting for a start marker.
    pub orphan_bytes: u32,
    /// Frames skipped according to the sequence id.
    pub missed_messages: u32,
    /// Frames abandoned after their header was accepted.
    pub aborted_messages: u32,
    /// Aborted frames whose checksum did not match.
    pub failed_verifications: u32,
}

/// Byte-at-a-time frame parser and builder for one channel direction.
///
/// Wire format:
/// ```text
/// [start?][length LE][seq id LE?][payload][pad?][checksum LE?][stop?]
/// ```
///
/// Receive and send share one linear buffer of `max_frame_len` bytes, so an
/// instance serves exactly one direction at a time. `add_byte` never fails:
/// corrupt input is dropped, counted in [`FrameStats`] and parsing restarts at
/// the next byte.
#[derive(Debug)]
pub struct FrameMachine {
    config: FrameConfig,
    layout: FrameLayout,
    verifier: Verifier,
    max_payload_len: usize,
    buf: Box<[u8]>,

    state: ParseState,
    pos: usize,
    current_len: usize,
    post_payload: usize,
    ready_len: Option<usize>,

    expected_seq: u32,
    tx_seq: u32,
    packet_len: usize,

    stats: FrameStats,
}

impl FrameMachine {
    /// Build a machine for `config`, initialized and ready for the first byte.
    pub fn new(config: FrameConfig) -> Result<Self> {
        config.validate()?;

        let mut verifier = Verifier::new(config.verifier);
        verifier.init();
        let layout = FrameLayout::new(&config, &verifier);
        let max_payload_len = max_payload_len(&config, &layout);

        let mut machine = Self {
            buf: vec![0u8; config.max_frame_len].into_boxed_slice(),
            config,
            layout,
            verifier,
            max_payload_len,
            state: ParseState::StartMarker,
            pos: 0,
            current_len: 0,
            post_payload: 0,
            ready_len: None,
            expected_seq: 0,
            tx_seq: 0,
            packet_len: 0,
            stats: FrameStats::default(),
        };
        machine.init();
        Ok(machine)
    }

    /// Reset parse state, sequence tracking and statistics.
    pub fn init(&mut self) {
        self.clear();
        self.expected_seq = 0;
        self.tx_seq = 0;
        self.packet_len = 0;
        self.stats = FrameStats::default();
    }

    /// Abandon any partially received frame. Statistics are kept.
    pub fn clear(&mut self) {
        self.state = self.initial_state();
        self.pos = 0;
        self.current_len = 0;
        self.post_payload = 0;
        self.ready_len = None;
    }

    /// Feed one received byte. Returns `true` when it completed a valid frame,
    /// whose payload stays readable through [`FrameMachine::payload`] until the
    /// next call.
    pub fn add_byte(&mut self, byte: u8) -> bool {
        self.ready_len = None;

        match self.state {
            ParseState::StartMarker => {
                if byte != self.config.start_marker {
                    self.stats.orphan_bytes = self.stats.orphan_bytes.wrapping_add(1);
                    return false;
                }
                self.push(byte);
                self.state = ParseState::Length;
                false
            }
            ParseState::Length => {
                self.push(byte);
                if self.pos < self.layout.seq_pos {
                    return false;
                }
                let len = self
                    .config
                    .length_width
                    .read(&self.buf[self.layout.len_pos..]) as usize;
                if len > self.config.max_frame_len
                    || self.layout.packet_len(len) > self.config.max_frame_len
                {
                    debug!(
                        len,
                        max_frame_len = self.config.max_frame_len,
                        "frame length out of range, resyncing"
                    );
                    return self.abort();
                }
                self.current_len = len;
                self.post_payload = self.layout.post_payload(len);
                if self.config.use_seq_id {
                    self.state = ParseState::SequenceId;
                    false
                } else {
                    self.enter_payload()
                }
            }
            ParseState::SequenceId => {
                self.push(byte);
                if self.pos < self.layout.payload_pos {
                    return false;
                }
                self.track_sequence();
                self.enter_payload()
            }
            ParseState::Payload => {
                self.push(byte);
                if self.pos < self.post_payload {
                    return false;
                }
                self.payload_done()
            }
            ParseState::Verification => {
                self.push(byte);
                if self.pos < self.post_payload + self.layout.result_size {
                    return false;
                }
                let computed = self
                    .verifier
                    .compute(&self.buf[self.layout.seq_pos..self.post_payload]);
                let received = self.verifier.read_result(&self.buf[self.post_payload..]);
                if computed != received {
                    debug!(
                        computed = format_args!("0x{computed:X}"),
                        received = format_args!("0x{received:X}"),
                        "frame verification failed, resyncing"
                    );
                    self.stats.failed_verifications =
                        self.stats.failed_verifications.wrapping_add(1);
                    return self.abort();
                }
                self.verified()
            }
            ParseState::StopMarker => {
                if byte != self.config.stop_marker {
                    debug!(byte, "missing stop marker, resyncing");
                    return self.abort();
                }
                self.push(byte);
                self.complete()
            }
        }
    }

    /// Payload of the frame completed by the last [`FrameMachine::add_byte`].
    pub fn payload(&self) -> Option<&[u8]> {
        let start = self.layout.payload_pos;
        self.ready_len.map(|len| &self.buf[start..start + len])
    }

    /// Sequence id of the frame completed by the last [`FrameMachine::add_byte`].
    pub fn sequence_id(&self) -> Option<u32> {
        match self.ready_len {
            Some(_) if self.config.use_seq_id => Some(
                self.config
                    .seq_id_width
                    .read(&self.buf[self.layout.seq_pos..]),
            ),
            _ => None,
        }
    }

    /// Send area. Write the payload here, then call
    /// [`FrameMachine::prepare_packet`].
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let start = self.layout.payload_pos;
        &mut self.buf[start..start + self.max_payload_len]
    }

    /// Wrap the first `payload_len` bytes of the send area in a frame.
    ///
    /// Consumes one transmit sequence id. Returns the wire size; the bytes are
    /// available from [`FrameMachine::packet`].
    pub fn prepare_packet(&mut self, payload_len: usize) -> Result<usize> {
        if payload_len > self.max_payload_len {
            return Err(FrameError::PayloadTooLarge {
                size: payload_len,
                max: self.max_payload_len,
            });
        }
        let layout = self.layout;

        if self.config.use_start_marker {
            self.buf[0] = self.config.start_marker;
        }
        self.config
            .length_width
            .write(payload_len as u32, &mut self.buf[layout.len_pos..]);
        if self.config.use_seq_id {
            let width = self.config.seq_id_width;
            width.write(self.tx_seq, &mut self.buf[layout.seq_pos..]);
            self.tx_seq = self.tx_seq.wrapping_add(1) & width.max_value();
        }

        let post_payload = layout.post_payload(payload_len);
        self.buf[layout.payload_pos + payload_len..post_payload].fill(0);
        let mut end = post_payload;

        if self.config.use_verification {
            let value = self.verifier.compute(&self.buf[layout.seq_pos..post_payload]);
            self.verifier.write_result(value, &mut self.buf[end..]);
            end += layout.result_size;
        }
        if self.config.use_stop_marker {
            self.buf[end] = self.config.stop_marker;
            end += 1;
        }

        debug_assert!(end <= self.config.max_frame_len);
        self.packet_len = end;
        Ok(end)
    }

    pub(crate) fn payload_area(&self) -> &[u8] {
        let start = self.layout.payload_pos;
        &self.buf[start..start + self.max_payload_len]
    }

    /// Wire bytes of the last frame built by [`FrameMachine::prepare_packet`].
    pub fn packet(&self) -> &[u8] {
        &self.buf[..self.packet_len]
    }

    /// Largest payload that still fits in `max_frame_len` after padding.
    pub fn max_payload_len(&self) -> usize {
        self.max_payload_len
    }

    /// Wire size of a frame carrying `payload_len` bytes.
    pub fn packet_len(&self, payload_len: usize) -> usize {
        self.layout.packet_len(payload_len)
    }

    /// Offset of the payload within a frame.
    pub fn payload_offset(&self) -> usize {
        self.layout.payload_pos
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    fn initial_state(&self) -> ParseState {
        if self.config.use_start_marker {
            ParseState::StartMarker
        } else {
            ParseState::Length
        }
    }

    fn push(&mut self, byte: u8) {
        self.buf[self.pos] = byte;
        self.pos += 1;
    }

    fn track_sequence(&mut self) {
        let width = self.config.seq_id_width;
        let received = width.read(&self.buf[self.layout.seq_pos..]);
        // zero means "no reference yet": fresh start or a wrapped counter
        if self.expected_seq != 0 && received != self.expected_seq {
            debug!(
                expected = self.expected_seq,
                received, "sequence gap detected"
            );
            self.stats.missed_messages = self.stats.missed_messages.wrapping_add(1);
        }
        self.expected_seq = received.wrapping_add(1) & width.max_value();
    }

    fn enter_payload(&mut self) -> bool {
        if self.pos == self.post_payload {
            return self.payload_done();
        }
        self.state = ParseState::Payload;
        false
    }

    fn payload_done(&mut self) -> bool {
        if self.config.use_verification {
            self.state = ParseState::Verification;
            false
        } else {
            self.verified()
        }
    }

    fn verified(&mut self) -> bool {
        if self.config.use_stop_marker {
            self.state = ParseState::StopMarker;
            false
        } else {
            self.complete()
        }
    }

    fn complete(&mut self) -> bool {
        let len = self.current_len;
        trace!(len, packet_len = self.pos, "frame complete");
        self.clear();
        self.ready_len = Some(len);
        true
    }

    fn abort(&mut self) -> bool {
        self.stats.aborted_messages = self.stats.aborted_messages.wrapping_add(1);
        self.clear();
        false
    }
}

fn max_payload_len(config: &FrameConfig, layout: &FrameLayout) -> usize {
    let overhead = layout.payload_pos + layout.result_size + layout.stop_size;
    let mut avail = config.max_frame_len.saturating_sub(overhead);
    if layout.align > 1 {
        avail = avail.saturating_sub((layout.seq_size + avail) % layout.align);
    }
    avail.min(config.length_width.max_value() as usize)
}
