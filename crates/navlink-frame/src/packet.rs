use crate::config::FrameConfig;
use crate::error::{FrameError, Result};
use crate::header::{Message, MessageHeader, MessageLayout};
use crate::machine::{FrameMachine, FrameStats};

/// Packs several `{id, len}`-headed sub-messages into one frame payload.
///
/// Receiving: feed bytes with [`PacketHandler::add_byte`]; when it returns
/// `true` the cursor sits on the first sub-message and
/// [`PacketHandler::next_message`] walks the rest.
///
/// Sending: reserve a body with [`PacketHandler::message_slot`], fill it and
/// commit it with [`PacketHandler::next_message`] (or use
/// [`PacketHandler::put_message`]), then frame everything with
/// [`PacketHandler::prepare_packet`].
///
/// Both directions share the frame buffer and the running `messages_len`, so
/// an instance serves one direction.
#[derive(Debug)]
pub struct PacketHandler {
    machine: FrameMachine,
    layout: MessageLayout,
    cursor: Option<usize>,
    payload_len: usize,
    messages_len: usize,
}

impl PacketHandler {
    pub fn new(config: FrameConfig, layout: MessageLayout) -> Result<Self> {
        Ok(Self {
            machine: FrameMachine::new(config)?,
            layout,
            cursor: None,
            payload_len: 0,
            messages_len: 0,
        })
    }

    /// Reset the frame machine (statistics included) and both cursors.
    pub fn init(&mut self) {
        self.machine.init();
        self.cursor = None;
        self.payload_len = 0;
        self.messages_len = 0;
    }

    /// Drop the partial frame and the receive cursor. Accumulated outgoing
    /// sub-messages are kept.
    pub fn clear(&mut self) {
        self.machine.clear();
        self.cursor = None;
    }

    /// Feed one byte. Returns `true` when a frame completed.
    pub fn add_byte(&mut self, byte: u8) -> bool {
        if !self.machine.add_byte(byte) {
            self.cursor = None;
            return false;
        }
        self.payload_len = self.machine.payload().map_or(0, <[u8]>::len);
        self.messages_len = 0;
        self.cursor = Some(0);
        true
    }

    /// Whether the cursor sits on a complete sub-message.
    pub fn has_message(&self) -> bool {
        self.current().is_some()
    }

    pub fn message_id(&self) -> Option<u32> {
        self.current().map(|(header, _)| header.id)
    }

    /// Body length of the current sub-message (its `len` minus the header).
    pub fn message_payload_len(&self) -> Option<usize> {
        self.current()
            .map(|(header, _)| header.len - self.layout.header_len())
    }

    pub fn message_body(&self) -> Option<&[u8]> {
        let (header, offset) = self.current()?;
        let start = offset + self.layout.header_len();
        Some(&self.machine.payload_area()[start..offset + header.len])
    }

    /// Decode the current sub-message as `M`, checking its id.
    pub fn message<M: Message>(&self) -> Result<M> {
        let (header, _) = self.current().ok_or(FrameError::NoMessage)?;
        if header.id != M::ID {
            return Err(FrameError::UnexpectedMessage {
                expected: M::ID,
                actual: header.id,
            });
        }
        M::decode_body(self.message_body().ok_or(FrameError::NoMessage)?)
    }

    /// Advance past the sub-message at the cursor, adding its length to
    /// `messages_len`.
    ///
    /// On receive this moves to the next sub-message; the list ends once the
    /// consumed length reaches the payload length or a zero `len` is found.
    /// On send it commits the slot returned by [`PacketHandler::message_slot`].
    pub fn next_message(&mut self) {
        let Some(offset) = self.cursor else {
            return;
        };
        let len = self
            .layout
            .read_header(&self.machine.payload_area()[offset..])
            .map_or(0, |header| header.len);

        self.messages_len += len;
        self.cursor = if len == 0 || self.messages_len >= self.payload_len {
            None
        } else {
            Some(offset + len)
        };
    }

    /// Iterate over `(id, body)` of every sub-message in the completed frame
    /// without moving the cursor.
    pub fn messages(&self) -> Messages<'_> {
        Messages {
            payload: self.machine.payload().unwrap_or_default(),
            layout: self.layout,
            offset: 0,
        }
    }

    /// Write a header for `id` at the end of the accumulated sub-messages and
    /// return its `body_len`-byte body slot.
    pub fn message_slot(&mut self, id: u32, body_len: usize) -> Result<&mut [u8]> {
        let max_body = self.layout.max_body_len();
        if body_len > max_body {
            return Err(FrameError::MessageTooLarge {
                size: body_len,
                max: max_body,
            });
        }
        let offset = self.messages_len;
        let len = self.layout.header_len() + body_len;
        let max = self.machine.max_payload_len();
        if offset + len > max {
            return Err(FrameError::PayloadTooLarge {
                size: offset + len,
                max,
            });
        }

        let header_len = self.layout.header_len();
        let area = &mut self.machine.payload_mut()[offset..offset + len];
        self.layout.write_header(MessageHeader { id, len }, area)?;
        self.cursor = Some(offset);
        Ok(&mut area[header_len..])
    }

    /// Append a typed sub-message.
    pub fn put_message<M: Message>(&mut self, message: &M) -> Result<()> {
        let slot = self.message_slot(M::ID, message.body_len())?;
        message.encode_body(slot);
        self.commit();
        Ok(())
    }

    /// Append a sub-message with a raw body.
    pub fn put_variable(&mut self, id: u32, body: &[u8]) -> Result<()> {
        let slot = self.message_slot(id, body.len())?;
        slot.copy_from_slice(body);
        self.commit();
        Ok(())
    }

    /// Bytes of sub-messages accumulated so far (send) or consumed so far
    /// (receive).
    pub fn messages_len(&self) -> usize {
        self.messages_len
    }

    /// Room left in the frame payload for further sub-messages.
    pub fn free_space(&self) -> usize {
        self.machine.max_payload_len().saturating_sub(self.messages_len)
    }

    /// Frame the accumulated sub-messages and reset the write position.
    pub fn prepare_packet(&mut self) -> Result<usize> {
        let len = self.machine.prepare_packet(self.messages_len)?;
        self.messages_len = 0;
        self.cursor = None;
        Ok(len)
    }

    pub fn packet(&self) -> &[u8] {
        self.machine.packet()
    }

    /// Largest body a single sub-message can carry.
    pub fn max_message_payload_len(&self) -> usize {
        self.layout.max_body_len()
    }

    pub fn layout(&self) -> MessageLayout {
        self.layout
    }

    pub fn stats(&self) -> FrameStats {
        self.machine.stats()
    }

    pub fn machine(&self) -> &FrameMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut FrameMachine {
        &mut self.machine
    }

    fn commit(&mut self) {
        if let Some(offset) = self.cursor.take() {
            if let Some(header) = self
                .layout
                .read_header(&self.machine.payload_area()[offset..])
            {
                self.messages_len += header.len;
            }
        }
    }

    /// Header and offset of the sub-message at the cursor, if it lies fully
    /// within the received payload.
    fn current(&self) -> Option<(MessageHeader, usize)> {
        let offset = self.cursor?;
        let payload = self.machine.payload()?;
        let header = self.layout.read_header(payload.get(offset..)?)?;
        if header.len < self.layout.header_len() || offset + header.len > payload.len() {
            return None;
        }
        Some((header, offset))
    }
}

/// Iterator returned by [`PacketHandler::messages`].
#[derive(Debug, Clone)]
pub struct Messages<'a> {
    payload: &'a [u8],
    layout: MessageLayout,
    offset: usize,
}

impl<'a> Iterator for Messages<'a> {
    type Item = (u32, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.payload.get(self.offset..)?;
        let header = self.layout.read_header(rest)?;
        if header.len < self.layout.header_len() || header.len > rest.len() {
            self.offset = self.payload.len();
            return None;
        }
        self.offset += header.len;
        Some((header.id, &rest[self.layout.header_len()..header.len]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldWidth;
    use crate::header::{ensure_len, variable_message_len, FixedMessage};
    use crate::verify::{FletcherWidth, VerifierKind};

    const LAYOUT: MessageLayout = MessageLayout::new(FieldWidth::U16, FieldWidth::U8);

    fn rover_like() -> FrameConfig {
        FrameConfig {
            use_start_marker: true,
            use_stop_marker: true,
            use_seq_id: true,
            use_verification: true,
            length_width: FieldWidth::U16,
            max_frame_len: 512,
            seq_id_width: FieldWidth::U8,
            verifier: VerifierKind::Fletcher(FletcherWidth::Bits32),
            start_marker: 0x7F,
            stop_marker: 0xF7,
        }
    }

    fn handler() -> PacketHandler {
        PacketHandler::new(rover_like(), LAYOUT).unwrap()
    }

    #[derive(Debug, PartialEq)]
    struct Voltage {
        millivolts: u16,
        channel: u8,
    }

    impl Message for Voltage {
        const ID: u32 = 0x21;

        fn body_len(&self) -> usize {
            Self::BODY_LEN
        }

        fn encode_body(&self, dst: &mut [u8]) {
            dst[..2].copy_from_slice(&self.millivolts.to_le_bytes());
            dst[2] = self.channel;
        }

        fn decode_body(src: &[u8]) -> Result<Self> {
            ensure_len(src, Self::BODY_LEN)?;
            Ok(Self {
                millivolts: u16::from_le_bytes([src[0], src[1]]),
                channel: src[2],
            })
        }
    }

    impl FixedMessage for Voltage {
        const BODY_LEN: usize = 3;
    }

    /// Feed `wire` into `rx`, returning the byte count at which it completed.
    fn deliver(rx: &mut PacketHandler, wire: &[u8]) -> Option<usize> {
        let mut ready_at = None;
        for (i, &b) in wire.iter().enumerate() {
            if rx.add_byte(b) {
                ready_at = Some(i + 1);
            }
        }
        ready_at
    }

    #[test]
    fn test_iterates_three_messages() {
        let mut tx = handler();
        let mut rx = handler();

        tx.put_variable(1, &[0xA1; 10]).unwrap();
        tx.put_variable(2, &[0xB2; 20]).unwrap();
        tx.put_variable(3, &[0xC3; 5]).unwrap();
        assert_eq!(tx.messages_len(), 3 * 3 + 35);
        tx.prepare_packet().unwrap();
        assert_eq!(tx.messages_len(), 0);

        let wire = tx.packet().to_vec();
        deliver(&mut rx, &wire).unwrap();

        let mut seen = Vec::new();
        while rx.has_message() {
            seen.push((
                rx.message_id().unwrap(),
                rx.message_payload_len().unwrap(),
                rx.message_body().unwrap()[0],
            ));
            rx.next_message();
        }
        assert_eq!(seen, vec![(1, 10, 0xA1), (2, 20, 0xB2), (3, 5, 0xC3)]);
        assert!(!rx.has_message());
    }

    #[test]
    fn test_messages_iterator_leaves_cursor() {
        let mut tx = handler();
        let mut rx = handler();
        tx.put_variable(7, b"first").unwrap();
        tx.put_variable(8, b"second").unwrap();
        tx.prepare_packet().unwrap();
        let wire = tx.packet().to_vec();
        deliver(&mut rx, &wire).unwrap();

        let all: Vec<(u32, &[u8])> = rx.messages().collect();
        assert_eq!(all, vec![(7, &b"first"[..]), (8, &b"second"[..])]);
        assert_eq!(rx.message_id(), Some(7));
    }

    #[test]
    fn test_ready_at_expected_byte() {
        let mut tx = handler();
        let mut rx = handler();

        let slot = tx.message_slot(0x05, 57).unwrap();
        slot.fill(0x42);
        tx.next_message();
        assert_eq!(tx.messages_len(), variable_message_len(&LAYOUT, 57));

        let len = tx.prepare_packet().unwrap();
        assert_eq!(len, 4 + 60 + 1 + 4 + 1);
        let wire = tx.packet().to_vec();
        assert_eq!(deliver(&mut rx, &wire), Some(70));
        assert_eq!(rx.message_payload_len(), Some(57));
    }

    #[test]
    fn test_typed_message_roundtrip() {
        let mut tx = handler();
        let mut rx = handler();
        let sent = Voltage {
            millivolts: 12_400,
            channel: 2,
        };
        tx.put_message(&sent).unwrap();
        tx.put_variable(0x99, b"tail").unwrap();
        tx.prepare_packet().unwrap();
        let wire = tx.packet().to_vec();
        deliver(&mut rx, &wire).unwrap();

        assert_eq!(rx.message::<Voltage>().unwrap(), sent);
        rx.next_message();
        assert!(matches!(
            rx.message::<Voltage>(),
            Err(FrameError::UnexpectedMessage {
                expected: 0x21,
                actual: 0x99
            })
        ));
        rx.next_message();
        assert!(matches!(rx.message::<Voltage>(), Err(FrameError::NoMessage)));
    }

    #[test]
    fn test_zero_len_header_ends_list() {
        let mut tx = handler();
        let mut rx = handler();
        tx.put_variable(1, b"abc").unwrap();
        // zeroed header followed by junk
        let area = tx.machine_mut().payload_mut();
        area[6..9].fill(0);
        area[9..12].fill(0xEE);
        tx.machine_mut().prepare_packet(12).unwrap();
        let wire = tx.packet().to_vec();

        deliver(&mut rx, &wire).unwrap();
        assert_eq!(rx.message_id(), Some(1));
        rx.next_message();
        assert!(!rx.has_message());
        assert_eq!(rx.messages().count(), 1);
    }

    #[test]
    fn test_truncated_sub_message_is_not_exposed() {
        let mut tx = handler();
        let mut rx = handler();
        // header claims 40 bytes but the payload holds only 8
        let area = tx.machine_mut().payload_mut();
        area[..3].copy_from_slice(&[0x10, 0x00, 40]);
        tx.machine_mut().prepare_packet(8).unwrap();
        let wire = tx.packet().to_vec();

        deliver(&mut rx, &wire).unwrap();
        assert!(!rx.has_message());
        assert!(rx.message_body().is_none());
        assert_eq!(rx.messages().count(), 0);
    }

    #[test]
    fn test_empty_payload_has_no_message() {
        let mut tx = handler();
        let mut rx = handler();
        tx.prepare_packet().unwrap();
        let wire = tx.packet().to_vec();
        deliver(&mut rx, &wire).unwrap();
        assert!(!rx.has_message());
        assert_eq!(rx.messages().count(), 0);
    }

    #[test]
    fn test_cursor_dropped_on_next_byte() {
        let mut tx = handler();
        let mut rx = handler();
        tx.put_variable(1, b"x").unwrap();
        tx.prepare_packet().unwrap();
        let wire = tx.packet().to_vec();
        deliver(&mut rx, &wire).unwrap();
        assert!(rx.has_message());

        rx.add_byte(0x7F);
        assert!(!rx.has_message());
    }

    #[test]
    fn test_slot_limits() {
        let mut tx = handler();
        assert_eq!(tx.max_message_payload_len(), 252);
        assert!(matches!(
            tx.message_slot(1, 253),
            Err(FrameError::MessageTooLarge { size: 253, max: 252 })
        ));

        tx.put_variable(1, &[0; 252]).unwrap();
        // 255 + 255 > 503
        assert!(matches!(
            tx.put_variable(2, &[0; 252]),
            Err(FrameError::PayloadTooLarge { size: 510, max: 503 })
        ));
        assert_eq!(tx.free_space(), 503 - 255);
    }

    #[test]
    fn test_clear_keeps_outgoing_messages() {
        let mut tx = handler();
        tx.put_variable(1, b"keep").unwrap();
        tx.clear();
        assert_eq!(tx.messages_len(), 7);
        tx.init();
        assert_eq!(tx.messages_len(), 0);
    }
}
