//! Length-prefixed JSON framing for the GUI/backend wire protocol.
//!
//! Every message is framed as:
//! - A 4-byte big-endian payload length
//! - A UTF-8 JSON payload of exactly that length
//!
//! No magic, no checksum, no terminator — integrity is the local
//! transport's job. Framing is reconstituted here from arbitrary read
//! chunk boundaries; no partial reads or buffer management in user code.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, decode_json, encode_frame, encode_json, FrameConfig, DEFAULT_MAX_PAYLOAD,
    LENGTH_PREFIX_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
