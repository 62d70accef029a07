use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Request kinds the GUI can issue, as tagged on the wire.
///
/// Each maps to a distinct backend capability. The wire strings are fixed
/// protocol vocabulary; the derive uses the variant names verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    /// Send a set of files to one or more target devices.
    SendFile,
    /// Stop waiting for the recipient's accept/decline decision.
    CancelWaitForConfirmation,
    /// Cancel an outbound transfer that has already started.
    CancelSend,
    /// Accept or decline an inbound transfer request.
    ConfirmReceive,
    /// Cancel an inbound transfer that has already started.
    CancelReceive,
    /// Update persisted settings.
    ModifySettings,
    /// Initiate a device connection with a pairing code.
    ConnectToDevice,
    /// Ask the backend to shut down.
    ExitApp,
}

impl OperationType {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::SendFile => "SendFile",
            OperationType::CancelWaitForConfirmation => "CancelWaitForConfirmation",
            OperationType::CancelSend => "CancelSend",
            OperationType::ConfirmReceive => "ConfirmReceive",
            OperationType::CancelReceive => "CancelReceive",
            OperationType::ModifySettings => "ModifySettings",
            OperationType::ConnectToDevice => "ConnectToDevice",
            OperationType::ExitApp => "ExitApp",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a `SendFile` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendFilesRequest {
    pub target_devices: Vec<String>,
    pub files: Vec<PathBuf>,
}

/// Body of the transfer-scoped cancellation requests
/// (`CancelWaitForConfirmation`, `CancelSend`, `CancelReceive`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferActionRequest {
    pub transfer_id: String,
}

/// Body of a `ConfirmReceive` request.
///
/// `accepted_files` narrows acceptance to a subset of the offered files;
/// absent means all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmReceiveRequest {
    pub transfer_id: String,
    pub accept: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_files: Option<Vec<String>>,
}

/// Body of a `ModifySettings` request. Settings are opaque to this layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifySettingsRequest {
    pub settings: serde_json::Value,
}

/// Body of a `ConnectToDevice` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectToDeviceRequest {
    pub device_id: String,
    pub pin_code: String,
}
