use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lanlink_proto::OperationType;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::SessionError;

type ResponseOutcome = Result<Value, SessionError>;

/// Maps in-flight request identifiers to their pending completion handles.
///
/// Identifiers are monotonically increasing and never reused: the counter
/// only moves forward even as entries come and go, so a late response can
/// never match a newer request. Each entry is invalidated exactly once —
/// by a matching response, by its deadline, or by bulk cancellation on
/// transport teardown.
pub struct CorrelationTable {
    inner: Mutex<TableInner>,
    timeout: Duration,
}

struct TableInner {
    next_id: u64,
    entries: HashMap<u64, PendingEntry>,
}

struct PendingEntry {
    operation: OperationType,
    tx: mpsc::Sender<ResponseOutcome>,
    deadline: Instant,
}

impl CorrelationTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(TableInner {
                next_id: 1,
                entries: HashMap::new(),
            }),
            timeout,
        }
    }

    /// The response deadline applied to every registered request.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Allocate a fresh identifier without registering an entry.
    ///
    /// Used for fire-and-forget requests (`ExitApp` on the shutdown path)
    /// where nobody will wait for the response.
    pub fn allocate_id(&self) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        id
    }

    /// Register a pending request and hand back its completion handle.
    pub fn register(self: &Arc<Self>, operation: OperationType) -> (u64, ResponseHandle) {
        let (tx, rx) = mpsc::channel();
        let deadline = Instant::now() + self.timeout;

        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.insert(
            id,
            PendingEntry {
                operation,
                tx,
                deadline,
            },
        );

        (
            id,
            ResponseHandle {
                msg_id: id,
                operation,
                deadline,
                rx,
                table: Arc::clone(self),
            },
        )
    }

    /// Resolve a pending entry with the response data.
    ///
    /// Returns `false` when no live entry matches — the request already
    /// timed out or the response is spurious. Such frames are dropped
    /// with a diagnostic, not treated as errors.
    pub fn resolve(&self, msg_id: u64, data: Value) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.entries.remove(&msg_id) {
            Some(entry) => {
                // Send while holding the lock: a handle that observes the
                // entry gone is guaranteed to find the outcome queued.
                let _ = entry.tx.send(Ok(data));
                true
            }
            None => {
                debug!(msg_id, "dropping response with no pending entry");
                false
            }
        }
    }

    /// Remove an entry without completing it.
    ///
    /// Used when transmission of the request itself failed, so no response
    /// can ever arrive. Returns true when an entry was removed.
    pub fn discard(&self, msg_id: u64) -> bool {
        self.inner
            .lock()
            .unwrap()
            .entries
            .remove(&msg_id)
            .is_some()
    }

    /// Fail every entry whose deadline has passed.
    ///
    /// Driven from the read loop, so entries abandoned by their callers
    /// still get swept out.
    pub fn expire_overdue(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();
        let overdue: Vec<u64> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in overdue {
            if let Some(entry) = inner.entries.remove(&id) {
                warn!(msg_id = id, operation = %entry.operation, "request timed out");
                let _ = entry.tx.send(Err(SessionError::Timeout {
                    operation: entry.operation,
                    timeout: self.timeout,
                }));
            }
        }
    }

    /// Bulk-cancel every outstanding entry with `TransportClosedError`.
    ///
    /// Called on transport teardown; pending handles must never leak
    /// silently.
    pub fn fail_all_closed(&self, reason: &str) {
        let mut inner = self.inner.lock().unwrap();
        let count = inner.entries.len();
        if count > 0 {
            warn!(count, reason, "cancelling outstanding requests");
        }
        for (_, entry) in inner.entries.drain() {
            let _ = entry.tx.send(Err(SessionError::closed(reason)));
        }
    }

    /// Number of requests currently awaiting a response.
    pub fn outstanding(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }
}

/// Completion handle for one in-flight request.
///
/// Completes exactly once: with the response data, with `Timeout` after
/// the deadline, or with `TransportClosed` on teardown.
pub struct ResponseHandle {
    msg_id: u64,
    operation: OperationType,
    deadline: Instant,
    rx: mpsc::Receiver<ResponseOutcome>,
    table: Arc<CorrelationTable>,
}

impl ResponseHandle {
    /// The correlation identifier stamped into the request.
    pub fn msg_id(&self) -> u64 {
        self.msg_id
    }

    /// The operation this handle belongs to.
    pub fn operation(&self) -> OperationType {
        self.operation
    }

    /// Block the calling thread until the request completes.
    ///
    /// Never called from the read loop; the reader resolves entries
    /// without blocking.
    pub fn wait(self) -> ResponseOutcome {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        match self.rx.recv_timeout(remaining) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                if self.table.discard(self.msg_id) {
                    return Err(SessionError::Timeout {
                        operation: self.operation,
                        timeout: self.table.timeout(),
                    });
                }
                // The entry is gone, so a completion was queued under the
                // table lock before we could observe it.
                self.rx.try_recv().unwrap_or(Err(SessionError::Timeout {
                    operation: self.operation,
                    timeout: self.table.timeout(),
                }))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(SessionError::closed("correlation table dropped"))
            }
        }
    }

    /// Non-blocking poll for a completed outcome.
    pub fn try_wait(&self) -> Option<ResponseOutcome> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn table(timeout_ms: u64) -> Arc<CorrelationTable> {
        Arc::new(CorrelationTable::new(Duration::from_millis(timeout_ms)))
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let table = table(1000);
        let (id1, h1) = table.register(OperationType::SendFile);
        let (id2, h2) = table.register(OperationType::CancelSend);
        assert!(id2 > id1);

        table.resolve(id1, json!({}));
        table.resolve(id2, json!({}));
        let _ = h1.wait();
        let _ = h2.wait();

        // Resolved ids are not handed out again.
        let (id3, _h3) = table.register(OperationType::ExitApp);
        assert!(id3 > id2);
    }

    #[test]
    fn resolve_completes_handle_exactly_once() {
        let table = table(1000);
        let (id, handle) = table.register(OperationType::ConnectToDevice);

        assert!(table.resolve(id, json!({"status": "ok"})));
        assert_eq!(handle.wait().unwrap(), json!({"status": "ok"}));

        // Second resolve for the same id is a stale drop.
        assert!(!table.resolve(id, json!({"status": "ok"})));
        assert_eq!(table.outstanding(), 0);
    }

    #[test]
    fn wait_times_out_and_late_response_is_dropped() {
        let table = table(30);
        let (id, handle) = table.register(OperationType::SendFile);

        let err = handle.wait().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Timeout {
                operation: OperationType::SendFile,
                ..
            }
        ));

        // The entry was discarded on timeout; the late response has no home.
        assert!(!table.resolve(id, json!({"status": "late"})));
    }

    #[test]
    fn expire_overdue_sweeps_abandoned_entries() {
        let table = table(10);
        let (_, handle) = table.register(OperationType::ModifySettings);
        std::thread::sleep(Duration::from_millis(25));

        table.expire_overdue();
        assert_eq!(table.outstanding(), 0);

        let err = handle.wait().unwrap_err();
        assert!(matches!(err, SessionError::Timeout { .. }));
    }

    #[test]
    fn fail_all_closed_rejects_every_outstanding_handle() {
        let table = table(10_000);
        let (_, h1) = table.register(OperationType::SendFile);
        let (_, h2) = table.register(OperationType::ConnectToDevice);
        assert_eq!(table.outstanding(), 2);

        table.fail_all_closed("backend exited");
        assert_eq!(table.outstanding(), 0);

        for handle in [h1, h2] {
            let err = handle.wait().unwrap_err();
            assert!(matches!(err, SessionError::TransportClosed { .. }));
        }
    }

    #[test]
    fn resolution_from_another_thread_wins_the_race() {
        let table = table(500);
        let (id, handle) = table.register(OperationType::ConfirmReceive);

        let resolver = {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                table.resolve(id, json!({"accepted": true}))
            })
        };

        assert_eq!(handle.wait().unwrap(), json!({"accepted": true}));
        assert!(resolver.join().unwrap());
    }

    #[test]
    fn allocate_id_advances_shared_counter() {
        let table = table(1000);
        let fire_and_forget = table.allocate_id();
        let (registered, _handle) = table.register(OperationType::ExitApp);
        assert!(registered > fire_and_forget);
        assert_eq!(table.outstanding(), 1);
    }
}
