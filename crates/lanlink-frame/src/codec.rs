use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use tracing::trace;

use crate::error::{FrameError, Result};

/// Frame header: 4-byte big-endian payload length.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Encode a raw payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────────┬─────────────────────────┐
/// │ Length (4B BE) │ UTF-8 JSON payload      │
/// │                │ (Length bytes)          │
/// └────────────────┴─────────────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(LENGTH_PREFIX_SIZE + payload.len());
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Serialize a value to JSON and encode it as one frame.
pub fn encode_json<T: Serialize>(value: &T, dst: &mut BytesMut) -> Result<()> {
    let payload = serde_json::to_vec(value).map_err(FrameError::Encode)?;
    encode_frame(&payload, dst)
}

/// Decode one frame's raw payload from a buffer.
///
/// Returns `Ok(None)` — buffer untouched — while fewer than 4 bytes, or
/// fewer than `4 + length` bytes, are available. On success the frame's
/// bytes are consumed from the buffer.
///
/// A declared length above `max_payload` is fatal: the length prefix is
/// the only synchronization mechanism, so an absurd value means the
/// stream is already lost.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None); // Need more data
    }

    let payload_len = u32::from_be_bytes(src[..LENGTH_PREFIX_SIZE].try_into().unwrap()) as usize;

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() < LENGTH_PREFIX_SIZE + payload_len {
        return Ok(None); // Need more data
    }

    src.advance(LENGTH_PREFIX_SIZE);
    Ok(Some(src.split_to(payload_len).freeze()))
}

/// Decode one frame and parse its payload as JSON.
///
/// Critical property: a parse failure is reported for that single frame
/// only. The malformed frame's bytes were already consumed via the
/// declared length, so the next call continues at the next frame boundary
/// — payload content can never desynchronize the stream, even when it
/// contains byte sequences resembling a length prefix.
pub fn decode_json(src: &mut BytesMut, max_payload: usize) -> Result<Option<serde_json::Value>> {
    let Some(payload) = decode_frame(src, max_payload)? else {
        return Ok(None);
    };
    match serde_json::from_slice(&payload) {
        Ok(value) => Ok(Some(value)),
        Err(source) => {
            trace!(len = payload.len(), "frame payload failed to parse as json");
            Err(FrameError::Decode {
                len: payload.len(),
                source,
            })
        }
    }
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
