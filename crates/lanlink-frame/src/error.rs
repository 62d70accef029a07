/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload could not be serialized to JSON. Caller bug, not retried.
    #[error("payload not serializable: {0}")]
    Encode(#[source] serde_json::Error),

    /// A complete frame carried malformed JSON.
    ///
    /// The frame's bytes have already been consumed using the declared
    /// length, so the stream stays synchronized; only this frame is lost.
    #[error("malformed frame payload ({len} bytes): {source}")]
    Decode {
        len: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors that poison only one frame, not the whole stream.
    pub fn is_per_frame(&self) -> bool {
        matches!(self, FrameError::Decode { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
