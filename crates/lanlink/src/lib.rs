//! GUI/backend IPC bridge for LAN file transfer.
//!
//! lanlink launches a transfer backend as a child process, talks to it over
//! per-session named pipes with length-prefixed JSON framing, correlates
//! requests with out-of-order responses and surfaces backend events and a
//! combined readiness signal to the consumer.
//!
//! # Crate Structure
//!
//! - [`transport`] — Unix domain socket endpoints and per-session channel names
//! - [`frame`] — Length-prefixed JSON message framing
//! - [`proto`] — Wire envelopes, operation and feedback vocabulary
//! - [`session`] — Backend session: supervision, correlation, readiness, events

/// Re-export transport types.
pub mod transport {
    pub use lanlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use lanlink_frame::*;
}

/// Re-export protocol types.
pub mod proto {
    pub use lanlink_proto::*;
}

/// Re-export session types.
pub mod session {
    pub use lanlink_session::*;
}
