use std::fmt;
use std::io;

use navlink_frame::FrameError;
use navlink_protocols::ProtocolError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied | io::ErrorKind::BrokenPipe => {
            FAILURE
        }
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. }
        | FrameError::MessageTooLarge { .. }
        | FrameError::Truncated { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        FrameError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        FrameError::EndOfStream => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn protocol_error(context: &str, err: ProtocolError) -> CliError {
    match err {
        ProtocolError::Frame(err) => frame_error(context, err),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}
