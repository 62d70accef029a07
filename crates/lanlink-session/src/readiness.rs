use std::sync::mpsc;
use std::sync::Mutex;

use tracing::debug;

/// One published change of the combined readiness boolean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessChange {
    /// The new overall value.
    pub ready: bool,
    /// Human-readable cause for downward transitions (backend exit,
    /// pipe fault). `None` on the way up.
    pub reason: Option<String>,
}

/// Folds three independent readiness signals into one observable boolean.
///
/// Overall = transport-connected AND backend-initialized AND
/// consumer-ready. A notification fires iff the derived value differs
/// from the last one published — the three inputs arrive in
/// non-deterministic order during startup and observers must not be
/// flooded with redundant identical states.
pub struct ReadinessAggregator {
    inner: Mutex<ReadinessInner>,
}

struct ReadinessInner {
    transport_connected: bool,
    backend_initialized: bool,
    consumer_ready: bool,
    last_reported: bool,
    tx: Option<mpsc::Sender<ReadinessChange>>,
}

impl ReadinessAggregator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ReadinessInner {
                transport_connected: false,
                backend_initialized: false,
                consumer_ready: false,
                last_reported: false,
                tx: None,
            }),
        }
    }

    /// Attach the single readiness observer.
    ///
    /// Replaces any previous subscription. No synthetic initial value is
    /// emitted; observers see changes only.
    pub fn subscribe(&self) -> mpsc::Receiver<ReadinessChange> {
        let (tx, rx) = mpsc::channel();
        self.inner.lock().unwrap().tx = Some(tx);
        rx
    }

    /// Signal from the pipe transport: both sub-connections established
    /// (true) or either one lost (false).
    pub fn set_transport_connected(&self, connected: bool, reason: Option<&str>) {
        self.apply(reason, |state| state.transport_connected = connected);
    }

    /// Signal from the reserved `backend_started` startup event, or its
    /// revocation when the backend goes away.
    pub fn set_backend_initialized(&self, initialized: bool, reason: Option<&str>) {
        self.apply(reason, |state| state.backend_initialized = initialized);
    }

    /// Signal from the consumer, once its event subscription is attached.
    pub fn set_consumer_ready(&self, ready: bool) {
        self.apply(None, |state| state.consumer_ready = ready);
    }

    /// Current overall value.
    pub fn is_ready(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.transport_connected && inner.backend_initialized && inner.consumer_ready
    }

    fn apply(&self, reason: Option<&str>, mutate: impl FnOnce(&mut ReadinessInner)) {
        let mut inner = self.inner.lock().unwrap();
        mutate(&mut inner);

        let overall =
            inner.transport_connected && inner.backend_initialized && inner.consumer_ready;
        if overall == inner.last_reported {
            return;
        }
        inner.last_reported = overall;

        debug!(
            ready = overall,
            transport = inner.transport_connected,
            backend = inner.backend_initialized,
            consumer = inner.consumer_ready,
            "readiness changed"
        );

        if let Some(tx) = &inner.tx {
            let change = ReadinessChange {
                ready: overall,
                reason: reason.map(str::to_string),
            };
            if tx.send(change).is_err() {
                // Observer went away; stop publishing to it.
                inner.tx = None;
            }
        }
    }
}

impl Default for ReadinessAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::TryRecvError;

    use super::*;

    #[test]
    fn full_startup_produces_exactly_one_notification() {
        let readiness = ReadinessAggregator::new();
        let rx = readiness.subscribe();

        readiness.set_transport_connected(true, None);
        readiness.set_backend_initialized(true, None);
        readiness.set_consumer_ready(true);

        let change = rx.try_recv().unwrap();
        assert!(change.ready);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(readiness.is_ready());
    }

    #[test]
    fn arrival_order_does_not_matter() {
        let readiness = ReadinessAggregator::new();
        let rx = readiness.subscribe();

        readiness.set_consumer_ready(true);
        readiness.set_backend_initialized(true, None);
        readiness.set_transport_connected(true, None);

        assert!(rx.try_recv().unwrap().ready);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn single_signal_off_produces_exactly_one_false() {
        let readiness = ReadinessAggregator::new();
        let rx = readiness.subscribe();

        readiness.set_transport_connected(true, None);
        readiness.set_backend_initialized(true, None);
        readiness.set_consumer_ready(true);
        assert!(rx.try_recv().unwrap().ready);

        readiness.set_transport_connected(false, Some("pipe reset"));
        readiness.set_backend_initialized(false, Some("pipe reset"));

        let change = rx.try_recv().unwrap();
        assert!(!change.ready);
        assert_eq!(change.reason.as_deref(), Some("pipe reset"));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn idempotent_sets_do_not_renotify() {
        let readiness = ReadinessAggregator::new();
        let rx = readiness.subscribe();

        readiness.set_consumer_ready(true);
        readiness.set_consumer_ready(true);
        readiness.set_transport_connected(false, None);

        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(!readiness.is_ready());
    }

    #[test]
    fn no_observer_is_fine() {
        let readiness = ReadinessAggregator::new();
        readiness.set_transport_connected(true, None);
        readiness.set_backend_initialized(true, None);
        readiness.set_consumer_ready(true);
        assert!(readiness.is_ready());
    }

    #[test]
    fn dropped_observer_detaches_quietly() {
        let readiness = ReadinessAggregator::new();
        let rx = readiness.subscribe();
        drop(rx);

        readiness.set_transport_connected(true, None);
        readiness.set_backend_initialized(true, None);
        readiness.set_consumer_ready(true);
        assert!(readiness.is_ready());
    }
}
