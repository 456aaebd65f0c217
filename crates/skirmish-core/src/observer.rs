//! Typed notification signals.
//!
//! The kernel announces lifecycle milestones through an [`ObserverHub`], a
//! bundle of per-topic [`Signal`]s. Handlers are plain closures; connecting
//! returns a [`SubscriptionHandle`] for later disconnection.
//!
//! Publication snapshots the subscriber list first and then invokes it, so a
//! handler may freely connect or disconnect (itself included) while a
//! publish is in flight: changes take effect from the next publish, and a
//! handler removed mid-publish still sees the current one.
//!
//! The hub is explicit state owned by the kernel, passed by reference to
//! whatever needs to publish or listen. There is no global instance.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::platform::PlatformIndex;
use crate::time::SimTime;

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

/// Handle to a connected subscriber, scoped to the signal that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle(u64);

type Callback<T> = Arc<Mutex<dyn FnMut(&T) + Send>>;

struct SignalInner<T> {
    subscribers: Vec<(SubscriptionHandle, Callback<T>)>,
    next_id: u64,
}

/// A single notification topic carrying payloads of type `T`.
///
/// Cloning yields another handle to the same subscriber list, so listeners
/// can hold a signal without holding the kernel.
pub struct Signal<T> {
    inner: Arc<Mutex<SignalInner<T>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SignalInner {
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Connect a handler. It will be invoked for every publish until
    /// disconnected.
    pub fn connect(&self, handler: impl FnMut(&T) + Send + 'static) -> SubscriptionHandle {
        let mut inner = self.inner.lock();
        let handle = SubscriptionHandle(inner.next_id);
        inner.next_id += 1;
        inner
            .subscribers
            .push((handle, Arc::new(Mutex::new(handler))));
        handle
    }

    /// Disconnect a handler. Returns false when the handle is unknown.
    /// A publish already in flight still invokes the removed handler once.
    pub fn disconnect(&self, handle: SubscriptionHandle) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(h, _)| *h != handle);
        inner.subscribers.len() != before
    }

    /// Invoke every subscriber with `payload`, in connection order.
    pub fn publish(&self, payload: &T) {
        // Snapshot under the lock, invoke outside it, so handlers may
        // re-enter this signal.
        let snapshot: Vec<Callback<T>> = {
            let inner = self.inner.lock();
            inner
                .subscribers
                .iter()
                .map(|(_, cb)| Arc::clone(cb))
                .collect()
        };
        for callback in snapshot {
            (&mut *callback.lock())(payload);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Payload for platform lifecycle topics.
#[derive(Debug, Clone)]
pub struct PlatformNotice {
    pub time: SimTime,
    pub index: PlatformIndex,
    pub name: String,
    pub platform_type: String,
}

/// Payload for part power and operability topics.
#[derive(Debug, Clone)]
pub struct PartNotice {
    pub time: SimTime,
    pub platform: PlatformIndex,
    pub part: String,
}

/// Payload for track lifetime topics.
#[derive(Debug, Clone)]
pub struct TrackNotice {
    pub time: SimTime,
    pub platform: PlatformIndex,
    pub track_id: u64,
}

// ---------------------------------------------------------------------------
// ObserverHub
// ---------------------------------------------------------------------------

/// Every notification topic the kernel publishes, one signal per topic.
#[derive(Default, Clone)]
pub struct ObserverHub {
    pub simulation_initializing: Signal<()>,
    pub simulation_pending_start: Signal<()>,
    pub simulation_starting: Signal<()>,
    pub simulation_pausing: Signal<SimTime>,
    pub simulation_resuming: Signal<SimTime>,
    pub simulation_complete: Signal<SimTime>,
    pub simulation_clock_rate_change: Signal<f64>,
    /// Published at the start of every advance pass with the pass target.
    pub advance_time: Signal<SimTime>,
    pub platform_added: Signal<PlatformNotice>,
    pub platform_initialized: Signal<PlatformNotice>,
    pub platform_deleted: Signal<PlatformNotice>,
    pub platform_broken: Signal<PlatformNotice>,
    /// A platform that could not be added (for example a duplicate name).
    pub platform_omitted: Signal<PlatformNotice>,
    pub part_turned_on: Signal<PartNotice>,
    pub part_turned_off: Signal<PartNotice>,
    pub part_operational_changed: Signal<PartNotice>,
    pub track_initiated: Signal<TrackNotice>,
    pub track_dropped: Signal<TrackNotice>,
}

impl ObserverHub {
    pub fn new() -> Self {
        Self::default()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn publish_reaches_all_subscribers_in_order() {
        let signal: Signal<u32> = Signal::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            signal.connect(move |v| seen.lock().push((tag, *v)));
        }
        signal.publish(&7);
        assert_eq!(*seen.lock(), vec![("a", 7), ("b", 7), ("c", 7)]);
    }

    #[test]
    fn disconnect_stops_delivery() {
        let signal: Signal<()> = Signal::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let handle = {
            let hits = Arc::clone(&hits);
            signal.connect(move |()| {
                hits.fetch_add(1, Ordering::Relaxed);
            })
        };
        signal.publish(&());
        assert!(signal.disconnect(handle));
        assert!(!signal.disconnect(handle));
        signal.publish(&());
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn handler_may_disconnect_itself_during_publish() {
        let signal: Signal<()> = Signal::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let handle_cell: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));
        let handle = {
            let hits = Arc::clone(&hits);
            let handle_cell = Arc::clone(&handle_cell);
            let signal = signal.clone();
            signal.clone().connect(move |()| {
                hits.fetch_add(1, Ordering::Relaxed);
                if let Some(h) = *handle_cell.lock() {
                    signal.disconnect(h);
                }
            })
        };
        *handle_cell.lock() = Some(handle);
        signal.publish(&());
        signal.publish(&());
        // Fired once, then gone.
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn handler_connected_during_publish_sees_next_publish() {
        let signal: Signal<()> = Signal::new();
        let late_hits = Arc::new(AtomicUsize::new(0));
        {
            let signal_handle = signal.clone();
            let late_hits = Arc::clone(&late_hits);
            let mut connected = false;
            signal.connect(move |()| {
                if !connected {
                    connected = true;
                    let late_hits = Arc::clone(&late_hits);
                    signal_handle.connect(move |()| {
                        late_hits.fetch_add(1, Ordering::Relaxed);
                    });
                }
            });
        }
        signal.publish(&());
        assert_eq!(late_hits.load(Ordering::Relaxed), 0);
        signal.publish(&());
        assert_eq!(late_hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn hub_topics_are_independent() {
        let hub = ObserverHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = Arc::clone(&hits);
            hub.platform_added.connect(move |_| {
                hits.fetch_add(1, Ordering::Relaxed);
            });
        }
        hub.platform_deleted.publish(&PlatformNotice {
            time: SimTime::ZERO,
            index: PlatformIndex(1),
            name: "ghost".into(),
            platform_type: "tank".into(),
        });
        assert_eq!(hits.load(Ordering::Relaxed), 0);
    }
}
