//! Serial framing and record codecs for a GNSS rover and its terminal.
//!
//! # Crate Structure
//!
//! - [`frame`]: byte-at-a-time frame machine, verifiers, multi-message packets
//!   and blocking/async stream adapters
//! - [`protocols`]: the rover-terminal link and the onboard log format

/// Re-export frame types.
pub mod frame {
    pub use navlink_frame::*;
}

/// Re-export protocol types.
pub mod protocols {
    pub use navlink_protocols::*;
}
