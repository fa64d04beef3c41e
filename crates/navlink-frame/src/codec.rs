use bytes::{Buf, Bytes, BytesMut};

use crate::config::FrameConfig;
use crate::error::{FrameError, Result};
use crate::machine::{FrameMachine, FrameStats};

/// An owned copy of a received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sequence id, when the channel carries one.
    pub sequence_id: Option<u32>,
    /// The frame payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame without a sequence id.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            sequence_id: None,
            payload: payload.into(),
        }
    }
}

/// Buffer-oriented codec over a pair of [`FrameMachine`]s, one per direction.
///
/// Decoding consumes input up to and including the byte that completed a
/// frame. Bytes that do not complete a frame are consumed too: the partial
/// frame lives in the receive machine.
#[derive(Debug)]
pub struct FrameCodec {
    rx: FrameMachine,
    tx: FrameMachine,
}

impl FrameCodec {
    pub fn new(config: FrameConfig) -> Result<Self> {
        Ok(Self {
            rx: FrameMachine::new(config.clone())?,
            tx: FrameMachine::new(config)?,
        })
    }

    /// Decode the next frame from `src`.
    ///
    /// Returns `None` once `src` is exhausted without completing a frame.
    pub fn decode_from(&mut self, src: &mut BytesMut) -> Option<Frame> {
        let mut consumed = 0usize;
        let mut frame = None;
        for &byte in src.iter() {
            consumed += 1;
            if self.rx.add_byte(byte) {
                frame = self.ready_frame();
                break;
            }
        }
        src.advance(consumed);
        frame
    }

    /// Encode `payload` as one frame appended to `dst`.
    pub fn encode_into(&mut self, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
        let max = self.tx.max_payload_len();
        if payload.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }
        self.tx.payload_mut()[..payload.len()].copy_from_slice(payload);
        self.tx.prepare_packet(payload.len())?;
        dst.extend_from_slice(self.tx.packet());
        Ok(())
    }

    /// Encode a frame whose payload is written in place by `fill`, which
    /// returns the number of bytes it wrote.
    pub fn encode_with<F>(&mut self, fill: F, dst: &mut BytesMut) -> Result<usize>
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        let len = fill(self.tx.payload_mut());
        let wire_len = self.tx.prepare_packet(len)?;
        dst.extend_from_slice(self.tx.packet());
        Ok(wire_len)
    }

    /// Receive-side statistics.
    pub fn stats(&self) -> FrameStats {
        self.rx.stats()
    }

    pub fn max_payload_len(&self) -> usize {
        self.tx.max_payload_len()
    }

    pub fn config(&self) -> &FrameConfig {
        self.rx.config()
    }

    pub fn receiver(&self) -> &FrameMachine {
        &self.rx
    }

    pub fn receiver_mut(&mut self) -> &mut FrameMachine {
        &mut self.rx
    }

    pub fn transmitter(&self) -> &FrameMachine {
        &self.tx
    }

    fn ready_frame(&self) -> Option<Frame> {
        self.rx.payload().map(|payload| Frame {
            sequence_id: self.rx.sequence_id(),
            payload: Bytes::copy_from_slice(payload),
        })
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        Ok(self.decode_from(src))
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        self.encode_into(&item, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldWidth;
    use crate::verify::{FletcherWidth, VerifierKind};

    fn config() -> FrameConfig {
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

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut codec = FrameCodec::new(config()).unwrap();
        let mut buf = BytesMut::new();
        codec.encode_into(b"hello, rover", &mut buf).unwrap();

        let frame = codec.decode_from(&mut buf).unwrap();
        assert_eq!(frame.payload.as_ref(), b"hello, rover");
        assert_eq!(frame.sequence_id, Some(0));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_buffer() {
        let mut codec = FrameCodec::new(config()).unwrap();
        let mut buf = BytesMut::new();
        codec.encode_into(b"first", &mut buf).unwrap();
        codec.encode_into(b"second", &mut buf).unwrap();

        let f1 = codec.decode_from(&mut buf).unwrap();
        assert_eq!(f1.payload.as_ref(), b"first");
        assert!(!buf.is_empty());

        let f2 = codec.decode_from(&mut buf).unwrap();
        assert_eq!((f2.sequence_id, f2.payload.as_ref()), (Some(1), &b"second"[..]));
        assert!(buf.is_empty());
        assert!(codec.decode_from(&mut buf).is_none());
    }

    #[test]
    fn test_split_input_resumes() {
        let mut codec = FrameCodec::new(config()).unwrap();
        let mut wire = BytesMut::new();
        codec.encode_into(b"split across reads", &mut wire).unwrap();

        let mut head = wire.split_to(7);
        assert!(codec.decode_from(&mut head).is_none());
        assert!(head.is_empty());

        let frame = codec.decode_from(&mut wire).unwrap();
        assert_eq!(frame.payload.as_ref(), b"split across reads");
    }

    #[test]
    fn test_encode_with_fills_in_place() {
        let mut codec = FrameCodec::new(config()).unwrap();
        let mut buf = BytesMut::new();
        let wire_len = codec
            .encode_with(
                |area| {
                    area[..3].copy_from_slice(b"abc");
                    3
                },
                &mut buf,
            )
            .unwrap();
        assert_eq!(wire_len, buf.len());

        let frame = codec.decode_from(&mut buf).unwrap();
        assert_eq!(frame.payload.as_ref(), b"abc");
    }

    #[test]
    fn test_encode_payload_too_large() {
        let mut codec = FrameCodec::new(config()).unwrap();
        let mut buf = BytesMut::new();
        let err = codec.encode_into(&[0u8; 600], &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 600, max: 503 }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_garbage_before_frame_counted() {
        let mut codec = FrameCodec::new(config()).unwrap();
        let mut buf = BytesMut::from(&[0x01, 0x02, 0x03][..]);
        codec.encode_into(b"x", &mut buf).unwrap();

        let frame = codec.decode_from(&mut buf).unwrap();
        assert_eq!(frame.payload.as_ref(), b"x");
        assert_eq!(codec.stats().orphan_bytes, 3);
    }

    #[test]
    fn test_frame_new_has_no_sequence() {
        let frame = Frame::new(Bytes::from_static(b"test"));
        assert_eq!(frame.sequence_id, None);
        assert_eq!(frame.payload.len(), 4);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_framed_stream_roundtrip() {
        use futures_util::{SinkExt, StreamExt};
        use tokio_util::codec::{FramedRead, FramedWrite};

        let (client, server) = tokio::io::duplex(4096);
        let mut sink = FramedWrite::new(client, FrameCodec::new(config()).unwrap());
        let mut stream = FramedRead::new(server, FrameCodec::new(config()).unwrap());

        sink.send(Bytes::from_static(b"one")).await.unwrap();
        sink.send(Bytes::from_static(b"two")).await.unwrap();
        drop(sink);

        let f1 = stream.next().await.unwrap().unwrap();
        let f2 = stream.next().await.unwrap().unwrap();
        assert_eq!(f1.payload.as_ref(), b"one");
        assert_eq!((f2.sequence_id, f2.payload.as_ref()), (Some(1), &b"two"[..]));
        assert!(stream.next().await.is_none());
    }
}
