use std::path::{Path, PathBuf};

use uuid::Uuid;

/// The pair of per-session endpoint paths handed to the backend.
///
/// Names carry a random UUID so concurrent app instances never collide and
/// a foreign process cannot guess the channel ahead of the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChannels {
    /// Endpoint the backend connects to for requests (GUI → backend).
    pub request: PathBuf,
    /// Endpoint the backend connects to for events and responses (backend → GUI).
    pub event: PathBuf,
}

impl SessionChannels {
    /// Generate a fresh channel pair under `dir`.
    pub fn generate(dir: impl AsRef<Path>) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        let dir = dir.as_ref();
        Self {
            request: dir.join(format!("lanlink-req-{id}.sock")),
            event: dir.join(format!("lanlink-evt-{id}.sock")),
        }
    }

    /// Generate a fresh channel pair under the OS temp directory.
    pub fn generate_in_temp() -> Self {
        Self::generate(std::env::temp_dir())
    }
}
