//! Record catalogs of the rover firmware, built on `navlink-frame`.
//!
//! - [`rover_terminal`]: the bidirectional radio link to the handheld
//!   terminal, several `{id, len}` sub-messages per verified frame.
//! - [`onboard_logs`]: the stored log, one typed record per frame.

pub mod error;
pub mod ids;
pub mod onboard_logs;
pub mod rover_terminal;

pub use error::{ProtocolError, Result};
