//! Wire envelopes for the GUI/backend protocol.
//!
//! Outbound frames carry a request envelope
//! (`{"operation", "data", "timestamp"}`); inbound frames are either
//! responses echoing `data.msgId` or backend-initiated events tagged with
//! a `feedback` string. Two feedback kinds are reserved for the session
//! layer itself and never reach the consumer.

pub mod envelope;
pub mod feedback;
pub mod operation;

pub use envelope::{
    EventEnvelope, InboundMessage, RequestEnvelope, FEEDBACK_BACKEND_STARTED,
    FEEDBACK_LOG_MESSAGE, MSG_ID_KEY,
};
pub use feedback::FeedbackKind;
pub use operation::{
    ConfirmReceiveRequest, ConnectToDeviceRequest, ModifySettingsRequest, OperationType,
    SendFilesRequest, TransferActionRequest,
};
