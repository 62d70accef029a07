use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use lanlink_transport::SessionChannels;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};

/// How often the watch thread polls the child for exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the backend child process for the lifetime of a session.
///
/// The backend is told its channel endpoints on the command line and is
/// expected to connect to both before doing anything else. Its stdout and
/// stderr are piped back here and re-emitted as log lines, so a backend
/// that crashes before the channels come up still leaves a trace.
///
/// There is no automatic restart: an exited backend fails the session and
/// the caller decides whether to start over.
pub struct Supervisor {
    program: PathBuf,
    child: Arc<Mutex<Child>>,
}

impl Supervisor {
    /// Spawn the backend process, handing it the session channel paths.
    pub fn launch(
        program: impl Into<PathBuf>,
        args: &[String],
        channels: &SessionChannels,
    ) -> Result<Self> {
        let program = program.into();

        let mut child = Command::new(&program)
            .args(args)
            .arg("--request-pipe")
            .arg(&channels.request)
            .arg("--event-pipe")
            .arg(&channels.event)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SessionError::Spawn {
                program: program.clone(),
                source,
            })?;

        info!(
            program = %program.display(),
            pid = child.id(),
            "backend process started"
        );

        if let Some(stdout) = child.stdout.take() {
            let pid = child.id();
            thread::spawn(move || {
                for line in BufReader::new(stdout).lines().map_while(|l| l.ok()) {
                    debug!(pid, "backend stdout: {line}");
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let pid = child.id();
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                    warn!(pid, "backend stderr: {line}");
                }
            });
        }

        Ok(Self {
            program,
            child: Arc::new(Mutex::new(child)),
        })
    }

    /// Process id of the supervised backend.
    pub fn pid(&self) -> u32 {
        self.child.lock().unwrap().id()
    }

    /// Path the backend was launched from.
    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    /// Check once whether the backend has exited.
    pub fn poll_exit(&self) -> Option<ExitStatus> {
        self.child.lock().unwrap().try_wait().ok().flatten()
    }

    /// Start a thread that watches for backend exit and runs `on_exit` once.
    ///
    /// The callback fires for any exit, expected or not; callers that kill
    /// the backend themselves should tear down their side first if they do
    /// not want the exit reported as a failure.
    pub fn watch<F>(&self, on_exit: F)
    where
        F: FnOnce(ExitStatus) + Send + 'static,
    {
        let child = Arc::clone(&self.child);
        thread::spawn(move || loop {
            let status = {
                let mut guard = child.lock().unwrap();
                match guard.try_wait() {
                    Ok(Some(status)) => Some(status),
                    Ok(None) => None,
                    Err(err) => {
                        warn!(error = %err, "failed to poll backend process");
                        return;
                    }
                }
            };
            match status {
                Some(status) => {
                    info!(%status, "backend process exited");
                    on_exit(status);
                    return;
                }
                None => thread::sleep(EXIT_POLL_INTERVAL),
            }
        });
    }

    /// Give the backend a grace period to exit on its own, then kill it.
    ///
    /// Used after an `ExitApp` request has been sent; a well-behaved
    /// backend exits before the deadline and the kill is a no-op.
    pub fn stop(&self, grace: Duration) {
        let deadline = std::time::Instant::now() + grace;
        loop {
            let mut guard = self.child.lock().unwrap();
            match guard.try_wait() {
                Ok(Some(status)) => {
                    debug!(%status, "backend exited within grace period");
                    return;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "failed to poll backend process");
                    break;
                }
            }
            if std::time::Instant::now() >= deadline {
                break;
            }
            drop(guard);
            thread::sleep(EXIT_POLL_INTERVAL.min(grace));
        }

        warn!(pid = self.pid(), "backend did not exit in time, killing");
        let mut guard = self.child.lock().unwrap();
        if let Err(err) = guard.kill() {
            // Already gone between the poll and the kill.
            debug!(error = %err, "kill failed, backend likely already exited");
        }
        let _ = guard.wait();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn channels() -> SessionChannels {
        SessionChannels::generate(std::env::temp_dir())
    }

    #[test]
    fn spawn_failure_names_the_program() {
        let err = Supervisor::launch("/nonexistent/lanlink-backend", &[], &channels())
            .err()
            .expect("spawn should fail");
        match err {
            SessionError::Spawn { program, .. } => {
                assert!(program.to_string_lossy().contains("lanlink-backend"));
            }
            other => panic!("expected Spawn error, got {other:?}"),
        }
    }

    #[test]
    fn watch_reports_exit() {
        let supervisor =
            Supervisor::launch("/bin/true", &[], &channels()).expect("spawn /bin/true");

        let (tx, rx) = std::sync::mpsc::channel();
        supervisor.watch(move |status| {
            let _ = tx.send(status.success());
        });

        let success = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("exit should be observed");
        assert!(success);
    }

    #[test]
    fn stop_kills_a_lingering_backend() {
        let supervisor = Supervisor::launch("/bin/sleep", &["30".to_string()], &channels())
            .expect("spawn /bin/sleep");

        supervisor.stop(Duration::from_millis(200));
        assert!(supervisor.poll_exit().is_some());
    }
}
