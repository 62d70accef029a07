use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use lanlink_transport::IpcStream;
use serde::Serialize;

use crate::codec::{encode_frame, encode_json, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
///
/// One writer serializes all frames on a connection, so delivery order is
/// write order. Backpressure (`WouldBlock`) and signal interruption are
/// retried until the whole frame is on the wire; a frame is never dropped
/// or torn.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Serialize a value to JSON and send it as one frame (blocking).
    pub fn send_json<V: Serialize>(&mut self, value: &V) -> Result<()> {
        self.buf.clear();
        encode_json(value, &mut self.buf)?;
        self.check_payload_size()?;
        self.write_buffered()
    }

    /// Send a pre-serialized payload as one frame (blocking).
    pub fn send_raw(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }
        self.buf.clear();
        encode_frame(payload, &mut self.buf)?;
        self.write_buffered()
    }

    fn check_payload_size(&self) -> Result<()> {
        let payload_len = self.buf.len().saturating_sub(crate::LENGTH_PREFIX_SIZE);
        if payload_len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload_len,
                max: self.config.max_payload_size,
            });
        }
        Ok(())
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl FrameWriter<IpcStream> {
    /// Create a frame writer for `IpcStream` and apply write timeout from config.
    pub fn with_config_ipc(inner: IpcStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(|err| FrameError::Io(std::io::Error::other(err.to_string())))?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;
    use serde_json::json;

    use super::*;
    use crate::codec::{decode_json, DEFAULT_MAX_PAYLOAD};

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_json(&json!({"operation": "ExitApp"})).unwrap();

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        let value = decode_json(&mut wire, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(value, json!({"operation": "ExitApp"}));
    }

    #[test]
    fn frames_preserve_write_order() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        for n in 0..5 {
            writer.send_json(&json!({"n": n})).unwrap();
        }

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        for n in 0..5 {
            let value = decode_json(&mut wire, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
            assert_eq!(value, json!({"n": n}));
        }
        assert!(wire.is_empty());
    }

    #[test]
    fn oversized_payload_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 8,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer
            .send_json(&json!({"data": "way too large for eight bytes"}))
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn would_block_writes_are_retried() {
        let sink = WouldBlockOnce {
            blocked: false,
            data: Vec::new(),
        };
        let mut writer = FrameWriter::new(sink);
        writer.send_json(&json!({"retry": true})).unwrap();

        let inner = writer.into_inner();
        let mut wire = BytesMut::from(inner.data.as_slice());
        let value = decode_json(&mut wire, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(value, json!({"retry": true}));
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send_json(&json!({})).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn send_raw_frames_bytes_verbatim() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_raw(br#"{"x":1}"#).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(&wire[..4], &[0, 0, 0, 7]);
        assert_eq!(&wire[4..], br#"{"x":1}"#);
    }

    struct WouldBlockOnce {
        blocked: bool,
        data: Vec<u8>,
    }

    impl Write for WouldBlockOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.blocked {
                self.blocked = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
