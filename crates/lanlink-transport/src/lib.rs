//! Local transport endpoints for the GUI/backend bridge.
//!
//! The GUI process owns two independent endpoints per session: one the
//! backend connects to for requests (GUI → backend) and one it connects to
//! for events and responses (backend → GUI). Each endpoint accepts exactly
//! one peer; the pair of connections together forms the duplex link.
//!
//! On Unix the endpoints are filesystem Unix domain sockets. Everything
//! above this layer works in terms of the [`IpcStream`] type.

pub mod channels;
pub mod error;
pub mod stream;

#[cfg(unix)]
pub mod uds;

pub use channels::SessionChannels;
pub use error::{Result, TransportError};
pub use stream::IpcStream;

#[cfg(unix)]
pub use uds::PipeEndpoint;
