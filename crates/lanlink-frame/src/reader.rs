use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use lanlink_transport::IpcStream;

use crate::codec::{decode_json, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete JSON envelopes from any `Read` stream.
///
/// Chunk boundaries carry no meaning at this layer; partial reads are
/// buffered internally and callers always get whole envelopes. The buffer
/// is drained frame-by-frame: after each call it holds either fewer than
/// 4 bytes or less than one full declared frame.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete envelope (blocking).
    ///
    /// A malformed frame yields `Err(FrameError::Decode { .. })` and leaves
    /// the stream positioned at the next frame boundary; callers are
    /// expected to log and keep reading. EOF yields
    /// `Err(FrameError::ConnectionClosed)`.
    pub fn read_envelope(&mut self) -> Result<serde_json::Value> {
        loop {
            match decode_json(&mut self.buf, self.config.max_payload_size) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(err) => return Err(err),
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<IpcStream> {
    /// Create a frame reader for `IpcStream` and apply read timeout from config.
    pub fn with_config_ipc(inner: IpcStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn transport_to_frame_error(err: lanlink_transport::TransportError) -> FrameError {
    match err {
        lanlink_transport::TransportError::Io(io)
        | lanlink_transport::TransportError::Accept(io) => FrameError::Io(io),
        lanlink_transport::TransportError::Bind { source, .. }
        | lanlink_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
