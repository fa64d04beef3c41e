//! Frame verifiers: table-driven CRC, Fletcher checksums and a no-op stub.
//!
//! The set is closed. [`VerifierKind`] is the configuration value and
//! [`Verifier`] the runtime instance (it owns the CRC lookup table).

use crate::config::FieldWidth;

/// Checksum width of a Fletcher verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FletcherWidth {
    /// 8-bit words, 16-bit result.
    Bits16,
    /// 16-bit little-endian words, 32-bit result.
    Bits32,
}

/// Which verifier protects a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierKind {
    NoOp,
    Crc { width: FieldWidth, polynomial: u32 },
    Fletcher(FletcherWidth),
}

impl Default for VerifierKind {
    fn default() -> Self {
        Self::NoOp
    }
}

/// Runtime verifier selected by [`VerifierKind`].
#[derive(Debug, Clone)]
pub enum Verifier {
    NoOp,
    Crc(Crc),
    Fletcher(Fletcher),
}

impl Verifier {
    /// Build an uninitialized verifier. Call [`Verifier::init`] before use.
    pub fn new(kind: VerifierKind) -> Self {
        match kind {
            VerifierKind::NoOp => Self::NoOp,
            VerifierKind::Crc { width, polynomial } => Self::Crc(Crc::new(width, polynomial)),
            VerifierKind::Fletcher(width) => Self::Fletcher(Fletcher::new(width)),
        }
    }

    pub fn init(&mut self) {
        if let Self::Crc(crc) = self {
            crc.init();
        }
    }

    /// Compute the verification value over `bytes`.
    pub fn compute(&self, bytes: &[u8]) -> u32 {
        match self {
            Self::NoOp => 0,
            Self::Crc(crc) => crc.compute(bytes),
            Self::Fletcher(fletcher) => fletcher.compute(bytes),
        }
    }

    /// Bytes the result occupies on the wire.
    pub fn result_size(&self) -> usize {
        match self {
            // placeholder byte, always zero
            Self::NoOp => 1,
            Self::Crc(crc) => crc.width.bytes(),
            Self::Fletcher(fletcher) => match fletcher.width {
                FletcherWidth::Bits16 => 2,
                FletcherWidth::Bits32 => 4,
            },
        }
    }

    /// Word size the checksummed region must be padded to.
    pub fn alignment(&self) -> usize {
        match self {
            Self::Fletcher(Fletcher {
                width: FletcherWidth::Bits32,
            }) => 2,
            _ => 1,
        }
    }

    /// Write `value` as a little-endian result of [`Verifier::result_size`] bytes.
    pub(crate) fn write_result(&self, value: u32, dst: &mut [u8]) {
        let size = self.result_size();
        dst[..size].copy_from_slice(&value.to_le_bytes()[..size]);
    }

    pub(crate) fn read_result(&self, src: &[u8]) -> u32 {
        let mut raw = [0u8; 4];
        let size = self.result_size();
        raw[..size].copy_from_slice(&src[..size]);
        u32::from_le_bytes(raw)
    }
}

/// Table-driven CRC of 8, 16 or 32 bits.
///
/// MSB-first, zero initial remainder, no reflection and no final XOR.
#[derive(Clone)]
pub struct Crc {
    width: FieldWidth,
    polynomial: u32,
    table: [u32; 256],
}

impl Crc {
    pub fn new(width: FieldWidth, polynomial: u32) -> Self {
        Self {
            width,
            polynomial,
            table: [0; 256],
        }
    }

    /// Fill the lookup table by dividing every possible dividend byte, one bit
    /// at a time.
    pub fn init(&mut self) {
        let bits = self.width.bits();
        let topbit = 1u32 << (bits - 1);
        let mask = self.width.max_value();

        for (dividend, slot) in self.table.iter_mut().enumerate() {
            let mut remainder = (dividend as u32) << (bits - 8);
            for _ in 0..8 {
                remainder = if remainder & topbit != 0 {
                    (remainder << 1) ^ self.polynomial
                } else {
                    remainder << 1
                };
            }
            *slot = remainder & mask;
        }
    }

    pub fn compute(&self, bytes: &[u8]) -> u32 {
        let shift = self.width.bits() - 8;
        let mask = self.width.max_value();
        bytes.iter().fold(0u32, |remainder, &byte| {
            let index = (u32::from(byte) ^ (remainder >> shift)) & 0xFF;
            (self.table[index as usize] ^ (remainder << 8)) & mask
        })
    }

    pub fn width(&self) -> FieldWidth {
        self.width
    }

    pub fn polynomial(&self) -> u32 {
        self.polynomial
    }
}

impl std::fmt::Debug for Crc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crc")
            .field("width", &self.width)
            .field("polynomial", &format_args!("0x{:X}", self.polynomial))
            .finish()
    }
}

/// Fletcher checksum with deferred modular reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fletcher {
    width: FletcherWidth,
}

struct FletcherParams {
    mask: u32,
    shift: u32,
    /// Additions that can run before the sums must be folded.
    batch: usize,
}

const FLETCHER16: FletcherParams = FletcherParams {
    mask: 0xFF,
    shift: 8,
    batch: 21,
};

const FLETCHER32: FletcherParams = FletcherParams {
    mask: 0xFFFF,
    shift: 16,
    batch: 359,
};

impl Fletcher {
    pub fn new(width: FletcherWidth) -> Self {
        Self { width }
    }

    pub fn width(&self) -> FletcherWidth {
        self.width
    }

    pub fn compute(&self, bytes: &[u8]) -> u32 {
        match self.width {
            FletcherWidth::Bits16 => fletcher_sums(bytes.iter().map(|&b| u32::from(b)), &FLETCHER16),
            FletcherWidth::Bits32 => fletcher_sums(
                bytes.chunks(2).map(|word| match *word {
                    [lo, hi] => u32::from(u16::from_le_bytes([lo, hi])),
                    [lo] => u32::from(lo),
                    _ => 0,
                }),
                &FLETCHER32,
            ),
        }
    }
}

fn fletcher_sums(words: impl Iterator<Item = u32>, params: &FletcherParams) -> u32 {
    let fold = |sum: u32| (sum & params.mask) + (sum >> params.shift);

    let mut sum1 = params.mask;
    let mut sum2 = params.mask;
    let mut pending = 0usize;

    for word in words {
        sum1 += word;
        sum2 += sum1;
        pending += 1;
        if pending == params.batch {
            sum1 = fold(sum1);
            sum2 = fold(sum2);
            pending = 0;
        }
    }
    if pending > 0 {
        sum1 = fold(sum1);
        sum2 = fold(sum2);
    }

    // second reduction brings both sums into 1..=mask
    sum1 = fold(sum1);
    sum2 = fold(sum2);
    (sum2 << params.shift) | sum1
}
