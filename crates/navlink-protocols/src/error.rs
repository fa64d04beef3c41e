use navlink_frame::FrameError;

/// Errors that can occur while encoding or decoding protocol records.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A sub-message id outside the rover-terminal catalog.
    #[error("unknown message id 0x{0:04X}")]
    UnknownMessage(u32),

    /// A log record type outside the onboard log catalog.
    #[error("unknown log record type 0x{0:04X}")]
    UnknownRecord(u16),
}

impl ProtocolError {
    /// Whether the underlying byte stream ended.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::Frame(FrameError::EndOfStream))
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
