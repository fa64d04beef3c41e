/// Errors raised outside the byte-level receive path.
///
/// `FrameMachine::add_byte` never fails: corruption is resolved by
/// resynchronization and only shows up in [`crate::FrameStats`]. These errors
/// cover configuration, the send path, typed sub-message access and the
/// blocking stream adapters.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame configuration cannot describe a usable frame.
    #[error("invalid frame configuration: {0}")]
    InvalidConfig(String),

    /// The payload does not fit in one frame.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A sub-message body exceeds what its length field can express.
    #[error("sub-message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// No sub-message is available at the cursor.
    #[error("no current sub-message")]
    NoMessage,

    /// The sub-message at the cursor has a different id than requested.
    #[error("unexpected sub-message id 0x{actual:X} (expected 0x{expected:X})")]
    UnexpectedMessage { expected: u32, actual: u32 },

    /// A record body is shorter than its schema requires.
    #[error("truncated record (needed {needed} bytes, got {available})")]
    Truncated { needed: usize, available: usize },

    /// An I/O error occurred on the byte source or sink.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream ended (EOF, or the sink accepted no bytes).
    #[error("byte stream ended")]
    EndOfStream,
}

pub type Result<T> = std::result::Result<T, FrameError>;
