use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::IpcStream;

/// One half of the session's duplex link, backed by a Unix domain socket.
///
/// An endpoint is a point-to-point channel, not a multi-client server: it
/// accepts exactly one backend connection and then stops listening. The
/// socket file is removed once the peer is accepted (or on drop), so a
/// second connection attempt is refused by the OS.
pub struct PipeEndpoint {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
}

impl PipeEndpoint {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(target_os = "macos")]
    const MAX_PATH_LEN: usize = 104;
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen at `path`.
    ///
    /// If the path already exists and is a stale socket it is removed first;
    /// any other existing file is an error.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind and listen at `path` with an explicit permission mode.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        // Remove a stale socket if one exists, but never remove non-socket files.
        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(|e| TransportError::Bind {
                    path: path.clone(),
                    source: e,
                })?;
            } else {
                return Err(TransportError::Bind {
                    path: path.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                });
            }
        }

        let listener = UnixListener::bind(&path).map_err(|e| TransportError::Bind {
            path: path.clone(),
            source: e,
        })?;

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
            TransportError::Bind {
                path: path.clone(),
                source: e,
            }
        })?;
        let created_metadata =
            std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
        let created_inode = Some((created_metadata.dev(), created_metadata.ino()));

        info!(?path, "endpoint listening");

        Ok(Self {
            listener,
            path,
            created_inode,
        })
    }

    /// Accept the single backend connection (blocking), consuming the endpoint.
    ///
    /// The listener and its socket file are torn down before the stream is
    /// returned, so no second peer can attach under the same name.
    pub fn accept_peer(self) -> Result<IpcStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "backend connected");
        Ok(IpcStream::from_unix(stream))
    }

    /// Like [`accept_peer`](Self::accept_peer), but give up after `timeout`.
    ///
    /// Polls a non-blocking accept so a backend that never dials in cannot
    /// wedge session startup; the endpoint (and its socket file) is torn
    /// down either way.
    pub fn accept_peer_timeout(self, timeout: std::time::Duration) -> Result<IpcStream> {
        const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(10);

        self.listener
            .set_nonblocking(true)
            .map_err(TransportError::Accept)?;
        let deadline = std::time::Instant::now() + timeout;

        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    stream.set_nonblocking(false).map_err(TransportError::Accept)?;
                    debug!(path = ?self.path, "backend connected");
                    return Ok(IpcStream::from_unix(stream));
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::Interrupted =>
                {
                    if std::time::Instant::now() >= deadline {
                        return Err(TransportError::Accept(std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            format!("no peer connected within {timeout:?}"),
                        )));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(TransportError::Accept(e)),
            }
        }
    }

    /// Connect to a listening endpoint (blocking).
    ///
    /// This is the backend side of the link; the GUI process only binds.
    pub fn connect(path: impl AsRef<Path>) -> Result<IpcStream> {
        let path = path.as_ref();
        let stream =
            std::os::unix::net::UnixStream::connect(path).map_err(|e| TransportError::Connect {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!(?path, "connected to endpoint");
        Ok(IpcStream::from_unix(stream))
    }

    /// The path this endpoint is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PipeEndpoint {
    fn drop(&mut self) {
        if let Some((expected_dev, expected_ino)) = self.created_inode {
            if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
                if metadata.file_type().is_socket()
                    && metadata.dev() == expected_dev
                    && metadata.ino() == expected_ino
                {
                    debug!(path = ?self.path, "cleaning up socket file");
                    let _ = std::fs::remove_file(&self.path);
                } else {
                    debug!(
                        path = ?self.path,
                        "socket path identity changed; skipping cleanup"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lanlink-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn bind_accept_connect() {
        let dir = temp_dir("bind");
        let sock_path = dir.join("test.sock");

        let endpoint = PipeEndpoint::bind(&sock_path).unwrap();
        assert!(sock_path.exists());

        let path_clone = sock_path.clone();
        let handle = std::thread::spawn(move || {
            let mut client = PipeEndpoint::connect(&path_clone).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = endpoint.accept_peer().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn accept_peer_removes_socket_file() {
        let dir = temp_dir("single-peer");
        let sock_path = dir.join("single.sock");

        let endpoint = PipeEndpoint::bind(&sock_path).unwrap();

        let path_clone = sock_path.clone();
        let handle =
            std::thread::spawn(move || PipeEndpoint::connect(&path_clone).map(|_stream| ()));

        let _peer = endpoint.accept_peer().unwrap();
        handle.join().unwrap().unwrap();

        // The listener is gone with the endpoint; a second connect has
        // nothing to attach to.
        assert!(!sock_path.exists(), "socket file should be gone after accept");
        assert!(PipeEndpoint::connect(&sock_path).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn accept_peer_timeout_gives_up() {
        let dir = temp_dir("accept-timeout");
        let sock_path = dir.join("nobody.sock");

        let endpoint = PipeEndpoint::bind(&sock_path).unwrap();
        let err = endpoint
            .accept_peer_timeout(std::time::Duration::from_millis(50))
            .unwrap_err();
        match err {
            TransportError::Accept(io) => {
                assert_eq!(io.kind(), std::io::ErrorKind::TimedOut)
            }
            other => panic!("expected Accept error, got {other:?}"),
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn path_too_long() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = PipeEndpoint::bind(&long_path);
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[test]
    fn bind_default_permissions_hardened() {
        let dir = temp_dir("perms");
        let sock_path = dir.join("perm.sock");

        let endpoint = PipeEndpoint::bind(&sock_path).unwrap();
        let mode = std::fs::metadata(&sock_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        drop(endpoint);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bind_rejects_existing_non_socket_file() {
        let dir = temp_dir("bind-file");
        let sock_path = dir.join("not-a-socket.sock");
        std::fs::write(&sock_path, b"regular-file").unwrap();

        let result = PipeEndpoint::bind(&sock_path);
        assert!(matches!(result, Err(TransportError::Bind { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn drop_does_not_remove_replaced_path() {
        let dir = temp_dir("drop-race");
        let sock_path = dir.join("drop.sock");

        let endpoint = PipeEndpoint::bind(&sock_path).unwrap();
        assert!(sock_path.exists());

        // Replace path while the endpoint is alive.
        std::fs::remove_file(&sock_path).unwrap();
        std::fs::write(&sock_path, b"replacement-file").unwrap();

        drop(endpoint);
        assert!(
            sock_path.exists(),
            "drop must not remove path if inode identity changed"
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
}
