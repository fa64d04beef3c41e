//! Bidirectional rover-terminal link.
//!
//! Frames carry a start and stop marker, an 8-bit sequence id and a
//! Fletcher-32 checksum; each frame packs several `{u16 id, u8 len}`
//! sub-messages.

mod messages;

use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, Bytes, BytesMut};
use navlink_frame::{
    FieldWidth, FletcherWidth, FrameConfig, FrameError, FrameStats, FrameWriter, Message,
    MessageLayout, PacketHandler, VerifierKind,
};
use serde::Serialize;
use tracing::debug;

pub use messages::*;

use crate::error::{ProtocolError, Result};
use crate::ids;

pub const START_MARKER: u8 = 0x7F;
pub const STOP_MARKER: u8 = 0xF7;
pub const MAX_FRAME_LEN: usize = 512;

/// Accumulated payload size at which [`TerminalWriter`] sends a packet.
pub const TARGET_PACKET_SIZE: usize = 256;

/// Sub-message header: 16-bit id, 8-bit length.
pub const LAYOUT: MessageLayout = MessageLayout::new(FieldWidth::U16, FieldWidth::U8);

/// Frame configuration of the link.
pub fn config() -> FrameConfig {
    FrameConfig {
        use_start_marker: true,
        use_stop_marker: true,
        use_seq_id: true,
        use_verification: true,
        length_width: FieldWidth::U16,
        max_frame_len: MAX_FRAME_LEN,
        seq_id_width: FieldWidth::U8,
        verifier: VerifierKind::Fletcher(FletcherWidth::Bits32),
        start_marker: START_MARKER,
        stop_marker: STOP_MARKER,
    }
}

/// A packet handler for one direction of the link.
pub fn handler() -> Result<PacketHandler> {
    Ok(PacketHandler::new(config(), LAYOUT)?)
}

/// Any rover-terminal record, decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminalMessage {
    BaselineVector(BaselineVector),
    ChannelInfo(ChannelInfo),
    RegisterInfo(RegisterInfo),
    RoverRfInfo(RoverRfInfo),
    SysRefPos(SysRefPos),
    AuxiliaryInfo(AuxiliaryInfo),
    ConsoleOutput(ConsoleOutput),
    BatteryInfo(BatteryInfo),
    ChargerInfo(ChargerInfo),
    AuxctlInfo(AuxctlInfo),
    TerminalRequest(TerminalRequest),
    RegisterWrite(RegisterWrite),
    RegisterRead(RegisterRead),
    ConsoleInput(ConsoleInput),
}

impl TerminalMessage {
    /// Decode a sub-message body by id.
    pub fn decode(id: u32, body: &[u8]) -> Result<Self> {
        let message = match id {
            ids::BASELINE_VECTOR => Self::BaselineVector(BaselineVector::decode_body(body)?),
            ids::CHANNEL_INFO => Self::ChannelInfo(ChannelInfo::decode_body(body)?),
            ids::REGISTER_INFO => Self::RegisterInfo(RegisterInfo::decode_body(body)?),
            ids::ROVER_RF_INFO => Self::RoverRfInfo(RoverRfInfo::decode_body(body)?),
            ids::SYS_REF_POS => Self::SysRefPos(SysRefPos::decode_body(body)?),
            ids::AUXILIARY_INFO => Self::AuxiliaryInfo(AuxiliaryInfo::decode_body(body)?),
            ids::CONSOLE_OUTPUT => Self::ConsoleOutput(ConsoleOutput::decode_body(body)?),
            ids::BATTERY_INFO => Self::BatteryInfo(BatteryInfo::decode_body(body)?),
            ids::CHARGER_INFO => Self::ChargerInfo(ChargerInfo::decode_body(body)?),
            ids::AUXCTL_INFO => Self::AuxctlInfo(AuxctlInfo::decode_body(body)?),
            ids::TERMINAL_REQUEST => Self::TerminalRequest(TerminalRequest::decode_body(body)?),
            ids::REGISTER_WRITE => Self::RegisterWrite(RegisterWrite::decode_body(body)?),
            ids::REGISTER_READ => Self::RegisterRead(RegisterRead::decode_body(body)?),
            ids::CONSOLE_INPUT => Self::ConsoleInput(ConsoleInput::decode_body(body)?),
            other => return Err(ProtocolError::UnknownMessage(other)),
        };
        Ok(message)
    }

    pub fn id(&self) -> u32 {
        match self {
            Self::BaselineVector(_) => ids::BASELINE_VECTOR,
            Self::ChannelInfo(_) => ids::CHANNEL_INFO,
            Self::RegisterInfo(_) => ids::REGISTER_INFO,
            Self::RoverRfInfo(_) => ids::ROVER_RF_INFO,
            Self::SysRefPos(_) => ids::SYS_REF_POS,
            Self::AuxiliaryInfo(_) => ids::AUXILIARY_INFO,
            Self::ConsoleOutput(_) => ids::CONSOLE_OUTPUT,
            Self::BatteryInfo(_) => ids::BATTERY_INFO,
            Self::ChargerInfo(_) => ids::CHARGER_INFO,
            Self::AuxctlInfo(_) => ids::AUXCTL_INFO,
            Self::TerminalRequest(_) => ids::TERMINAL_REQUEST,
            Self::RegisterWrite(_) => ids::REGISTER_WRITE,
            Self::RegisterRead(_) => ids::REGISTER_READ,
            Self::ConsoleInput(_) => ids::CONSOLE_INPUT,
        }
    }

    /// Catalog name of a message id.
    pub fn name(id: u32) -> Option<&'static str> {
        Some(match id {
            ids::BASELINE_VECTOR => "baseline_vector",
            ids::CHANNEL_INFO => "channel_info",
            ids::REGISTER_INFO => "register_info",
            ids::ROVER_RF_INFO => "rover_rf_info",
            ids::SYS_REF_POS => "sys_ref_pos",
            ids::AUXILIARY_INFO => "auxiliary_info",
            ids::CONSOLE_OUTPUT => "console_output",
            ids::BATTERY_INFO => "battery_info",
            ids::CHARGER_INFO => "charger_info",
            ids::AUXCTL_INFO => "auxctl_info",
            ids::TERMINAL_REQUEST => "terminal_request",
            ids::REGISTER_WRITE => "register_write",
            ids::REGISTER_READ => "register_read",
            ids::CONSOLE_INPUT => "console_input",
            _ => return None,
        })
    }
}

/// One sub-message as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: u32,
    pub body: Bytes,
}

impl RawMessage {
    pub fn decode(&self) -> Result<TerminalMessage> {
        TerminalMessage::decode(self.id, &self.body)
    }
}

/// The sub-messages of one verified packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalPacket {
    pub sequence_id: Option<u32>,
    pub messages: Vec<RawMessage>,
}

/// Batches sub-messages into packets.
///
/// A packet goes out once the accumulated payload reaches
/// [`TARGET_PACKET_SIZE`] or the next sub-message would not fit. Call
/// [`TerminalWriter::send_prepared`] to push out a partial packet.
pub struct TerminalWriter<W> {
    writer: FrameWriter<W>,
    packets: PacketHandler,
}

impl<W: Write> TerminalWriter<W> {
    pub fn new(inner: W) -> Result<Self> {
        Ok(Self {
            writer: FrameWriter::with_config(inner, config())?,
            packets: handler()?,
        })
    }

    /// Queue a typed record.
    pub fn push<M: Message>(&mut self, message: &M) -> Result<()> {
        self.make_room(message.body_len())?;
        self.packets.put_message(message)?;
        self.message_done()
    }

    /// Queue a sub-message with a raw body.
    pub fn push_raw(&mut self, id: u32, body: &[u8]) -> Result<()> {
        self.make_room(body.len())?;
        self.packets.put_variable(id, body)?;
        self.message_done()
    }

    /// Send console text, split into as few sub-messages as possible.
    ///
    /// Anything already queued goes out first.
    pub fn console_output(&mut self, text: &[u8]) -> Result<()> {
        self.send_prepared()?;
        for chunk in text.chunks(self.packets.max_message_payload_len()) {
            self.push_raw(ids::CONSOLE_OUTPUT, chunk)?;
        }
        Ok(())
    }

    /// Send whatever is queued as one packet.
    pub fn send_prepared(&mut self) -> Result<()> {
        if self.packets.messages_len() == 0 {
            return Ok(());
        }
        self.writer.write_packet(&mut self.packets)?;
        Ok(())
    }

    /// Bytes queued for the next packet.
    pub fn pending_len(&self) -> usize {
        self.packets.messages_len()
    }

    /// Send any queued sub-messages and return the sink.
    pub fn finish(mut self) -> Result<W> {
        self.send_prepared()?;
        Ok(self.writer.into_inner())
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    fn make_room(&mut self, body_len: usize) -> Result<()> {
        if LAYOUT.header_len() + body_len > self.packets.free_space() {
            debug!(
                pending = self.packets.messages_len(),
                body_len, "packet full, sending early"
            );
            self.send_prepared()?;
        }
        Ok(())
    }

    fn message_done(&mut self) -> Result<()> {
        if self.packets.messages_len() >= TARGET_PACKET_SIZE {
            self.send_prepared()?;
        }
        Ok(())
    }
}

const READ_CHUNK_SIZE: usize = 1024;

/// Reads verified packets and splits them into sub-messages.
pub struct TerminalReader<R> {
    inner: R,
    buf: BytesMut,
    packets: PacketHandler,
}

impl<R: Read> TerminalReader<R> {
    pub fn new(inner: R) -> Result<Self> {
        Ok(Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            packets: handler()?,
        })
    }

    /// Read the next verified packet (blocking).
    ///
    /// Fails with [`FrameError::EndOfStream`] at EOF.
    pub fn read_packet(&mut self) -> Result<TerminalPacket> {
        loop {
            if let Some(packet) = self.drain_buffer() {
                return Ok(packet);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err).into()),
            };
            if read == 0 {
                return Err(FrameError::EndOfStream.into());
            }
            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    pub fn stats(&self) -> FrameStats {
        self.packets.stats()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn drain_buffer(&mut self) -> Option<TerminalPacket> {
        let mut consumed = 0usize;
        let mut packet = None;
        for &byte in self.buf.iter() {
            consumed += 1;
            if self.packets.add_byte(byte) {
                packet = Some(collect_messages(&mut self.packets));
                break;
            }
        }
        self.buf.advance(consumed);
        packet
    }
}

fn collect_messages(packets: &mut PacketHandler) -> TerminalPacket {
    let sequence_id = packets.machine().sequence_id();
    let mut messages = Vec::new();
    while packets.has_message() {
        if let (Some(id), Some(body)) = (packets.message_id(), packets.message_body()) {
            messages.push(RawMessage {
                id,
                body: Bytes::copy_from_slice(body),
            });
        }
        packets.next_message();
    }
    TerminalPacket {
        sequence_id,
        messages,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn channel(n: u8) -> ChannelInfo {
        ChannelInfo {
            channel: n,
            rover_qli: 3,
            prn: u16::from(n) + 1,
            azim: -45,
            elev: 30,
            ..ChannelInfo::default()
        }
    }

    fn read_all(bytes: Vec<u8>) -> (Vec<TerminalPacket>, FrameStats) {
        let mut reader = TerminalReader::new(Cursor::new(bytes)).unwrap();
        let mut packets = Vec::new();
        loop {
            match reader.read_packet() {
                Ok(packet) => packets.push(packet),
                Err(err) if err.is_end_of_stream() => break,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        (packets, reader.stats())
    }

    #[test]
    fn test_max_payload_of_link() {
        let handler = handler().unwrap();
        assert_eq!(handler.machine().max_payload_len(), 503);
        assert_eq!(handler.max_message_payload_len(), 252);
    }

    #[test]
    fn test_records_survive_writer_and_reader() {
        let mut writer = TerminalWriter::new(Vec::new()).unwrap();
        let baseline = BaselineVector {
            time_stamp: 42,
            dx: 1.5,
            qli: 5,
            ..BaselineVector::default()
        };
        writer.push(&baseline).unwrap();
        writer.push(&channel(0)).unwrap();
        writer
            .push(&RegisterInfo {
                op: 1,
                addr: RegisterAddress::BaseHeight.as_u32(),
                value: 2_000_000,
            })
            .unwrap();
        let bytes = writer.finish().unwrap();

        let (packets, stats) = read_all(bytes);
        assert_eq!(packets.len(), 1);
        assert_eq!(stats, FrameStats::default());

        let decoded: Vec<TerminalMessage> = packets[0]
            .messages
            .iter()
            .map(|m| m.decode().unwrap())
            .collect();
        assert_eq!(decoded[0], TerminalMessage::BaselineVector(baseline));
        assert_eq!(decoded[1], TerminalMessage::ChannelInfo(channel(0)));
        assert_eq!(decoded[2].id(), ids::REGISTER_INFO);
    }

    #[test]
    fn test_writer_flushes_at_target_size() {
        let mut writer = TerminalWriter::new(Vec::new()).unwrap();
        // 15 bytes per channel record; the 18th crosses 256
        for n in 0..18 {
            writer.push(&channel(n)).unwrap();
        }
        assert_eq!(writer.pending_len(), 0);
        writer.push(&channel(18)).unwrap();
        assert_eq!(writer.pending_len(), 15);

        let (packets, _) = read_all(writer.finish().unwrap());
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].messages.len(), 18);
        assert_eq!(packets[1].messages.len(), 1);
        assert_eq!(packets[1].sequence_id, Some(1));
    }

    #[test]
    fn test_writer_sends_early_when_message_would_not_fit() {
        let mut writer = TerminalWriter::new(Vec::new()).unwrap();
        writer.push_raw(0x7E, &[1; 10]).unwrap();
        writer.push_raw(0x7E, &[2; 250]).unwrap();
        // 13 + 253 crosses the target size
        assert_eq!(writer.pending_len(), 0);

        writer.push_raw(0x7E, &[3; 250]).unwrap();
        // 253 + 253 exceeds the 503-byte payload
        writer.push_raw(0x7E, &[4; 250]).unwrap();
        assert_eq!(writer.pending_len(), 253);

        let (packets, _) = read_all(writer.finish().unwrap());
        let sizes: Vec<Vec<usize>> = packets
            .iter()
            .map(|p| p.messages.iter().map(|m| m.body.len()).collect())
            .collect();
        assert_eq!(sizes, vec![vec![10, 250], vec![250], vec![250]]);
    }

    #[test]
    fn test_console_output_is_chunked() {
        let text: Vec<u8> = (0..600).map(|i| b'a' + (i % 26) as u8).collect();
        let mut writer = TerminalWriter::new(Vec::new()).unwrap();
        writer.console_output(&text).unwrap();

        let (packets, _) = read_all(writer.finish().unwrap());
        let chunks: Vec<RawMessage> = packets.into_iter().flat_map(|p| p.messages).collect();
        assert_eq!(
            chunks.iter().map(|m| m.body.len()).collect::<Vec<_>>(),
            vec![252, 252, 96]
        );
        assert!(chunks.iter().all(|m| m.id == ids::CONSOLE_OUTPUT));
        let joined: Vec<u8> = chunks.iter().flat_map(|m| m.body.iter().copied()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_reader_skips_corrupted_packet() {
        let mut writer = TerminalWriter::new(Vec::new()).unwrap();
        writer.push(&channel(1)).unwrap();
        writer.send_prepared().unwrap();
        let first_len = writer.get_ref().len();
        writer.push(&channel(2)).unwrap();
        let mut bytes = writer.finish().unwrap();
        bytes[first_len / 2] ^= 0x01;

        let (packets, stats) = read_all(bytes);
        assert_eq!(packets.len(), 1);
        assert_eq!(stats.failed_verifications, 1);
        assert_eq!(
            packets[0].messages[0].decode().unwrap(),
            TerminalMessage::ChannelInfo(channel(2))
        );
    }

    #[test]
    fn test_unknown_id_is_reported() {
        let err = TerminalMessage::decode(0x7E, &[]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMessage(0x7E)));
        assert_eq!(TerminalMessage::name(0x7E), None);
        assert_eq!(TerminalMessage::name(ids::SYS_REF_POS), Some("sys_ref_pos"));
    }

    #[test]
    fn test_message_serializes_with_type_tag() {
        let json = serde_json::to_value(TerminalMessage::RegisterRead(RegisterRead { addr: 3 }))
            .unwrap();
        assert_eq!(json["type"], "register_read");
        assert_eq!(json["addr"], 3);
    }
}
