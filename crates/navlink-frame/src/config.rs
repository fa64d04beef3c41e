use crate::error::{FrameError, Result};
use crate::verify::{Verifier, VerifierKind};

/// Width of an integer field on the wire (length, sequence id, sub-message
/// header fields). All multi-byte fields are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldWidth {
    U8,
    U16,
    U32,
}

impl FieldWidth {
    /// Size of the field in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    pub const fn bits(self) -> u32 {
        (self.bytes() * 8) as u32
    }

    /// Largest value the field can hold.
    pub const fn max_value(self) -> u32 {
        match self {
            Self::U8 => u8::MAX as u32,
            Self::U16 => u16::MAX as u32,
            Self::U32 => u32::MAX,
        }
    }

    /// Decode a little-endian value from the first `bytes()` bytes of `src`.
    pub(crate) fn read(self, src: &[u8]) -> u32 {
        match self {
            Self::U8 => u32::from(src[0]),
            Self::U16 => u32::from(u16::from_le_bytes([src[0], src[1]])),
            Self::U32 => u32::from_le_bytes([src[0], src[1], src[2], src[3]]),
        }
    }

    /// Encode `value` (truncated to the width) into the first `bytes()` bytes of `dst`.
    pub(crate) fn write(self, value: u32, dst: &mut [u8]) {
        let n = self.bytes();
        dst[..n].copy_from_slice(&value.to_le_bytes()[..n]);
    }
}

/// Configuration of one frame channel.
///
/// Fixed for the lifetime of a [`crate::FrameMachine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    pub use_start_marker: bool,
    pub use_stop_marker: bool,
    pub use_seq_id: bool,
    pub use_verification: bool,
    pub length_width: FieldWidth,
    /// Largest complete frame in bytes, markers and checksum included.
    pub max_frame_len: usize,
    pub seq_id_width: FieldWidth,
    pub verifier: VerifierKind,
    pub start_marker: u8,
    pub stop_marker: u8,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            use_start_marker: false,
            use_stop_marker: false,
            use_seq_id: false,
            use_verification: false,
            length_width: FieldWidth::U8,
            max_frame_len: 255,
            seq_id_width: FieldWidth::U8,
            verifier: VerifierKind::NoOp,
            start_marker: 0,
            stop_marker: 0,
        }
    }
}

impl FrameConfig {
    /// Check that the configuration describes at least an empty frame and a
    /// usable verifier.
    pub fn validate(&self) -> Result<()> {
        if let VerifierKind::Crc { width, polynomial } = self.verifier {
            if polynomial > width.max_value() {
                return Err(FrameError::InvalidConfig(format!(
                    "CRC polynomial 0x{polynomial:X} does not fit in {} bits",
                    width.bits()
                )));
            }
        }

        let layout = FrameLayout::new(self, &Verifier::new(self.verifier));
        let empty = layout.packet_len(0);
        if empty > self.max_frame_len {
            return Err(FrameError::InvalidConfig(format!(
                "max frame length {} is below the {empty}-byte frame overhead",
                self.max_frame_len
            )));
        }
        Ok(())
    }
}

/// Byte offsets of a frame, derived once from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameLayout {
    pub len_pos: usize,
    pub seq_pos: usize,
    pub payload_pos: usize,
    pub seq_size: usize,
    pub result_size: usize,
    pub align: usize,
    pub stop_size: usize,
}

impl FrameLayout {
    pub fn new(config: &FrameConfig, verifier: &Verifier) -> Self {
        let len_pos = usize::from(config.use_start_marker);
        let seq_pos = len_pos + config.length_width.bytes();
        let seq_size = if config.use_seq_id {
            config.seq_id_width.bytes()
        } else {
            0
        };
        let (result_size, align) = if config.use_verification {
            (verifier.result_size(), verifier.alignment())
        } else {
            (0, 1)
        };

        Self {
            len_pos,
            seq_pos,
            payload_pos: seq_pos + seq_size,
            seq_size,
            result_size,
            align,
            stop_size: usize::from(config.use_stop_marker),
        }
    }

    /// Zero bytes inserted after a payload of `len` bytes.
    pub fn padding(&self, len: usize) -> usize {
        match (self.seq_size + len) % self.align {
            0 => 0,
            r => self.align - r,
        }
    }

    /// Offset of the first byte after payload and padding.
    pub fn post_payload(&self, len: usize) -> usize {
        self.payload_pos + len + self.padding(len)
    }

    /// Total wire size of a frame carrying `len` payload bytes.
    pub fn packet_len(&self, len: usize) -> usize {
        self.post_payload(len) + self.result_size + self.stop_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::FletcherWidth;

    #[test]
    fn test_field_width_le_roundtrip() {
        let mut buf = [0u8; 4];
        FieldWidth::U16.write(0xBEEF, &mut buf);
        assert_eq!(&buf[..2], &[0xEF, 0xBE]);
        assert_eq!(FieldWidth::U16.read(&buf), 0xBEEF);

        FieldWidth::U32.write(0x0102_0304, &mut buf);
        assert_eq!(buf, [4, 3, 2, 1]);
        assert_eq!(FieldWidth::U32.read(&buf), 0x0102_0304);

        FieldWidth::U8.write(0x1FF, &mut buf);
        assert_eq!(FieldWidth::U8.read(&buf), 0xFF);
    }

    #[test]
    fn test_default_config_is_minimal() {
        let config = FrameConfig::default();
        assert!(!config.use_start_marker);
        assert!(!config.use_verification);
        assert_eq!(config.length_width, FieldWidth::U8);
        assert_eq!(config.max_frame_len, 255);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_tiny_max_frame() {
        let config = FrameConfig {
            use_start_marker: true,
            use_stop_marker: true,
            length_width: FieldWidth::U16,
            max_frame_len: 3,
            ..FrameConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FrameError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_wide_polynomial() {
        let config = FrameConfig {
            use_verification: true,
            verifier: VerifierKind::Crc {
                width: FieldWidth::U8,
                polynomial: 0x1021,
            },
            ..FrameConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FrameError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_layout_padding_tracks_alignment() {
        let config = FrameConfig {
            use_seq_id: true,
            use_verification: true,
            verifier: VerifierKind::Fletcher(FletcherWidth::Bits32),
            ..FrameConfig::default()
        };
        let layout = FrameLayout::new(&config, &Verifier::new(config.verifier));
        // seq (1) + payload must be even
        assert_eq!(layout.padding(0), 1);
        assert_eq!(layout.padding(1), 0);
        assert_eq!(layout.padding(60), 1);
        assert_eq!(layout.packet_len(60), 1 + 1 + 60 + 1 + 4);
    }

    #[test]
    fn test_layout_without_verification_has_no_padding() {
        let config = FrameConfig {
            use_seq_id: true,
            verifier: VerifierKind::Fletcher(FletcherWidth::Bits32),
            ..FrameConfig::default()
        };
        let layout = FrameLayout::new(&config, &Verifier::new(config.verifier));
        assert_eq!(layout.padding(7), 0);
        assert_eq!(layout.result_size, 0);
        assert_eq!(layout.packet_len(7), 1 + 1 + 7);
    }
}
