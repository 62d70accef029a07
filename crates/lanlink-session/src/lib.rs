//! Session management for the GUI/backend bridge.
//!
//! A [`Session`] launches the backend executable, owns the two pipe
//! connections, correlates requests with out-of-order responses, folds
//! the three readiness signals into one observable boolean and routes
//! unsolicited backend events to the registered consumer.
//!
//! Failure is delivered asynchronously: callers get errors through the
//! same [`ResponseHandle`] path as normal responses, never as a panic or
//! a synchronous throw from inside the read loop.

pub mod correlation;
pub mod error;
pub mod readiness;
pub mod router;
pub mod session;
pub mod supervisor;

pub use correlation::{CorrelationTable, ResponseHandle};
pub use error::{Result, SessionError};
pub use readiness::{ReadinessAggregator, ReadinessChange};
pub use router::EventRouter;
pub use session::{Session, SessionConfig};
pub use supervisor::Supervisor;
