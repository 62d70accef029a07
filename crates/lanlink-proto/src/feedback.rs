use std::fmt;

/// Known backend event kinds, as tagged in the `feedback` field.
///
/// The wire set is non-exhaustive: a backend newer than this build may
/// emit kinds we have never heard of, which land in `Other` and still
/// reach the consumer verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackKind {
    /// General error notification with attached detail.
    Error,
    /// A device appeared (full device info).
    FoundDevice,
    /// A device went away (device id only).
    LostDevice,
    /// Current settings pushed at startup.
    Settings,
    /// A requested device connection succeeded.
    ConnectedToDevice,
    /// Recipient agreed to receive (device id + accepted file names).
    RecipientAccepted,
    /// Recipient declined (device id only).
    RecipientDeclined,
    /// Per-file outbound progress (device id, file, percent).
    FileSendingProgress,
    /// One file passed its hash check on the receiving end.
    FileSendingCompleted,
    /// Whole outbound session finished.
    AllSendingCompleted,
    /// An inbound transfer request is waiting for confirmation.
    RequestReceiveFiles,
    /// Per-file inbound progress (file, percent).
    FileReceivingProgress,
    /// One inbound file passed its hash check.
    FileReceivingCompleted,
    /// Whole inbound session finished.
    AllReceivingCompleted,
    /// Receiver cancelled while we were sending.
    SendingCancelledByReceiver,
    /// Sender cancelled while we were receiving.
    ReceivingCancelledBySender,
    /// Anything this build does not recognize.
    Other(String),
}

impl FeedbackKind {
    pub fn from_wire(tag: &str) -> Self {
        match tag {
            "Error" => FeedbackKind::Error,
            "FoundDevice" => FeedbackKind::FoundDevice,
            "LostDevice" => FeedbackKind::LostDevice,
            "Settings" => FeedbackKind::Settings,
            "ConnectedToDevice" => FeedbackKind::ConnectedToDevice,
            "RecipientAccepted" => FeedbackKind::RecipientAccepted,
            "RecipientDeclined" => FeedbackKind::RecipientDeclined,
            "FileSendingProgress" => FeedbackKind::FileSendingProgress,
            "FileSendingCompleted" => FeedbackKind::FileSendingCompleted,
            "AllSendingCompleted" => FeedbackKind::AllSendingCompleted,
            "RequestReceiveFiles" => FeedbackKind::RequestReceiveFiles,
            "FileReceivingProgress" => FeedbackKind::FileReceivingProgress,
            "FileReceivingCompleted" => FeedbackKind::FileReceivingCompleted,
            "AllReceivingCompleted" => FeedbackKind::AllReceivingCompleted,
            "SendingCancelledByReceiver" => FeedbackKind::SendingCancelledByReceiver,
            "ReceivingCancelledBySender" => FeedbackKind::ReceivingCancelledBySender,
            other => FeedbackKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FeedbackKind::Error => "Error",
            FeedbackKind::FoundDevice => "FoundDevice",
            FeedbackKind::LostDevice => "LostDevice",
            FeedbackKind::Settings => "Settings",
            FeedbackKind::ConnectedToDevice => "ConnectedToDevice",
            FeedbackKind::RecipientAccepted => "RecipientAccepted",
            FeedbackKind::RecipientDeclined => "RecipientDeclined",
            FeedbackKind::FileSendingProgress => "FileSendingProgress",
            FeedbackKind::FileSendingCompleted => "FileSendingCompleted",
            FeedbackKind::AllSendingCompleted => "AllSendingCompleted",
            FeedbackKind::RequestReceiveFiles => "RequestReceiveFiles",
            FeedbackKind::FileReceivingProgress => "FileReceivingProgress",
            FeedbackKind::FileReceivingCompleted => "FileReceivingCompleted",
            FeedbackKind::AllReceivingCompleted => "AllReceivingCompleted",
            FeedbackKind::SendingCancelledByReceiver => "SendingCancelledByReceiver",
            FeedbackKind::ReceivingCancelledBySender => "ReceivingCancelledBySender",
            FeedbackKind::Other(tag) => tag,
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_roundtrip() {
        for tag in [
            "Error",
            "FoundDevice",
            "LostDevice",
            "Settings",
            "ConnectedToDevice",
            "RecipientAccepted",
            "RecipientDeclined",
            "FileSendingProgress",
            "FileSendingCompleted",
            "AllSendingCompleted",
            "RequestReceiveFiles",
            "FileReceivingProgress",
            "FileReceivingCompleted",
            "AllReceivingCompleted",
            "SendingCancelledByReceiver",
            "ReceivingCancelledBySender",
        ] {
            let kind = FeedbackKind::from_wire(tag);
            assert!(!matches!(kind, FeedbackKind::Other(_)), "{tag} unknown");
            assert_eq!(kind.as_str(), tag);
        }
    }

    #[test]
    fn unknown_kind_passes_through() {
        let kind = FeedbackKind::from_wire("BrandNewThing");
        assert_eq!(kind, FeedbackKind::Other("BrandNewThing".to_string()));
        assert_eq!(kind.as_str(), "BrandNewThing");
    }
}
