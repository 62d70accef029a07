use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::Mutex;

use lanlink_proto::EventEnvelope;
use tracing::{debug, warn};

/// Default cap on events held before the consumer subscribes.
pub const DEFAULT_BACKLOG_CAPACITY: usize = 256;

/// Routes unsolicited backend events to the single registered consumer.
///
/// Events that arrive before the consumer subscribes are buffered and
/// replayed in arrival order — device discovery happens during startup,
/// before any UI exists, and those events must not be lost. The backlog
/// is bounded; on overflow the oldest event is dropped with a warning.
///
/// A consumer that goes away (receiver dropped) turns dispatch into a
/// logged drop. Nothing here ever propagates back into the read loop.
pub struct EventRouter {
    inner: Mutex<RouterInner>,
}

struct RouterInner {
    tx: Option<mpsc::Sender<EventEnvelope>>,
    backlog: VecDeque<EventEnvelope>,
    capacity: usize,
    consumer_lost: bool,
}

impl EventRouter {
    pub fn new(backlog_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RouterInner {
                tx: None,
                backlog: VecDeque::new(),
                capacity: backlog_capacity.max(1),
                consumer_lost: false,
            }),
        }
    }

    /// Attach the single event consumer, replaying any buffered backlog.
    ///
    /// Replaces a previous subscription; the backlog only ever feeds the
    /// first subscriber, later ones start from live traffic.
    pub fn subscribe(&self) -> mpsc::Receiver<EventEnvelope> {
        let (tx, rx) = mpsc::channel();
        let mut inner = self.inner.lock().unwrap();

        let replayed = inner.backlog.len();
        for event in inner.backlog.drain(..) {
            // Receiver is alive in our hand; send cannot fail here.
            let _ = tx.send(event);
        }
        if replayed > 0 {
            debug!(replayed, "replayed buffered events to new consumer");
        }

        inner.tx = Some(tx);
        inner.consumer_lost = false;
        rx
    }

    /// Deliver one event to the consumer, or buffer it if none is attached.
    pub fn dispatch(&self, event: EventEnvelope) {
        let mut inner = self.inner.lock().unwrap();

        if let Some(tx) = &inner.tx {
            match tx.send(event) {
                Ok(()) => return,
                Err(mpsc::SendError(event)) => {
                    // Consumer went away after having subscribed once;
                    // drop this and future events rather than re-buffer
                    // for a consumer that may never return.
                    warn!(feedback = %event.feedback, "event consumer gone, dropping event");
                    inner.tx = None;
                    inner.consumer_lost = true;
                    return;
                }
            }
        }

        if inner.consumer_lost {
            debug!(feedback = %event.feedback, "no event consumer, dropping event");
            return;
        }

        if inner.backlog.len() >= inner.capacity {
            if let Some(oldest) = inner.backlog.pop_front() {
                warn!(feedback = %oldest.feedback, "event backlog full, dropping oldest");
            }
        }
        inner.backlog.push_back(event);
    }

    /// Number of events waiting for a consumer.
    pub fn backlog_len(&self) -> usize {
        self.inner.lock().unwrap().backlog.len()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn event(feedback: &str, n: u64) -> EventEnvelope {
        serde_json::from_value(json!({"feedback": feedback, "data": {"n": n}})).unwrap()
    }

    #[test]
    fn live_dispatch_reaches_consumer() {
        let router = EventRouter::new(DEFAULT_BACKLOG_CAPACITY);
        let rx = router.subscribe();

        router.dispatch(event("FoundDevice", 1));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.feedback, "FoundDevice");
    }

    #[test]
    fn early_events_are_buffered_and_replayed_in_order() {
        let router = EventRouter::new(DEFAULT_BACKLOG_CAPACITY);

        router.dispatch(event("FoundDevice", 1));
        router.dispatch(event("FoundDevice", 2));
        router.dispatch(event("Settings", 3));
        assert_eq!(router.backlog_len(), 3);

        let rx = router.subscribe();
        assert_eq!(router.backlog_len(), 0);

        let order: Vec<u64> = rx
            .try_iter()
            .map(|e| e.data["n"].as_u64().unwrap())
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn overflow_drops_oldest() {
        let router = EventRouter::new(2);

        router.dispatch(event("FoundDevice", 1));
        router.dispatch(event("FoundDevice", 2));
        router.dispatch(event("FoundDevice", 3));
        assert_eq!(router.backlog_len(), 2);

        let rx = router.subscribe();
        let order: Vec<u64> = rx
            .try_iter()
            .map(|e| e.data["n"].as_u64().unwrap())
            .collect();
        assert_eq!(order, vec![2, 3]);
    }

    #[test]
    fn dropped_consumer_does_not_panic_dispatch() {
        let router = EventRouter::new(DEFAULT_BACKLOG_CAPACITY);
        let rx = router.subscribe();
        drop(rx);

        router.dispatch(event("LostDevice", 1));
        router.dispatch(event("LostDevice", 2));

        // Events after consumer loss are dropped, not re-buffered.
        assert_eq!(router.backlog_len(), 0);
    }

    #[test]
    fn resubscribe_starts_from_live_traffic() {
        let router = EventRouter::new(DEFAULT_BACKLOG_CAPACITY);
        let first = router.subscribe();
        drop(first);
        router.dispatch(event("FoundDevice", 1));

        let second = router.subscribe();
        router.dispatch(event("FoundDevice", 2));

        let order: Vec<u64> = second
            .try_iter()
            .map(|e| e.data["n"].as_u64().unwrap())
            .collect();
        assert_eq!(order, vec![2]);
    }
}
