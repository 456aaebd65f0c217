//! The event queue.
//!
//! Everything the kernel does at a simulated time is an [`Event`]. Events
//! are kept in a binary heap keyed by `(time, sequence)`, where the sequence
//! number is assigned monotonically at insertion, so equal-time events pop
//! in insertion order. A second queue instance keyed by elapsed wall-clock
//! seconds drives real-time housekeeping.
//!
//! Cancellation is soft: [`EventQueue::cancel`] marks the key and the entry
//! is discarded when it reaches the front, never extracted from the middle
//! of the heap.
//!
//! # Key types
//! - [`Event`] — behavior due at a simulated time
//! - [`EventDisposition`] — delete or reschedule after execution
//! - [`EventKey`] / [`WallEventKey`] — per-queue handles for soft cancellation
//! - [`OneShotEvent`] — closure adapter for simple actions
//! - [`EventQueue`] — the time-ordered min-heap

use std::collections::{BinaryHeap, HashSet};

use crate::sim::Simulation;
use crate::time::SimTime;

// ---------------------------------------------------------------------------
// Event trait
// ---------------------------------------------------------------------------

/// What to do with an event after it executes.
pub enum EventDisposition {
    /// Drop the event.
    Delete,
    /// Put the event back on the queue at the given (not earlier) time.
    Reschedule(SimTime),
}

/// A unit of work due at a simulated time.
///
/// Events own their due time so rescheduling can rewrite it in place. The
/// kernel passes itself mutably to `execute`, so events may schedule further
/// events, add or remove platforms, and publish notifications.
pub trait Event: Send {
    /// The time at which this event is due.
    fn time(&self) -> SimTime;

    /// Rewrite the due time. Called by the queue when rescheduling.
    fn set_time(&mut self, time: SimTime);

    /// Checked immediately before execution; returning false discards the
    /// event without running it. Useful for events whose subject may have
    /// been removed since scheduling.
    fn should_execute(&self, _sim: &Simulation) -> bool {
        true
    }

    /// Perform the work.
    fn execute(&mut self, sim: &mut Simulation) -> EventDisposition;
}

/// An event wrapping a closure that runs once and is deleted.
pub struct OneShotEvent {
    time: SimTime,
    action: Option<Box<dyn FnOnce(&mut Simulation) + Send>>,
}

impl OneShotEvent {
    pub fn new(time: SimTime, action: impl FnOnce(&mut Simulation) + Send + 'static) -> Self {
        Self {
            time,
            action: Some(Box::new(action)),
        }
    }
}

impl Event for OneShotEvent {
    fn time(&self) -> SimTime {
        self.time
    }

    fn set_time(&mut self, time: SimTime) {
        self.time = time;
    }

    fn execute(&mut self, sim: &mut Simulation) -> EventDisposition {
        if let Some(action) = self.action.take() {
            action(sim);
        }
        EventDisposition::Delete
    }
}

// ---------------------------------------------------------------------------
// EventQueue
// ---------------------------------------------------------------------------

/// Handle to a scheduled event, returned at insertion and accepted by
/// [`EventQueue::cancel`]. Keys are never reused within one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey(u64);

/// Handle to an event on the wall-clock queue. A distinct type from
/// [`EventKey`] so a wall handle cannot cancel a simulated-time event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WallEventKey(pub(crate) EventKey);

struct Entry {
    time: SimTime,
    seq: u64,
    key: EventKey,
    event: Box<dyn Event>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // BinaryHeap is a max-heap; invert so the smallest (time, seq) pops
    // first.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// An event popped from the front of the queue. `cancelled` is true when the
/// event was soft-cancelled while pending; the caller must not run it.
pub struct PoppedEvent {
    pub key: EventKey,
    pub time: SimTime,
    pub event: Box<dyn Event>,
    pub cancelled: bool,
}

/// A min-heap of events ordered by `(time, insertion sequence)`.
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
    next_key: u64,
    pending: HashSet<EventKey>,
    cancelled: HashSet<EventKey>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event at its own due time, returning its cancellation key.
    pub fn push(&mut self, event: Box<dyn Event>) -> EventKey {
        let key = EventKey(self.next_key);
        self.next_key += 1;
        self.push_entry(key, event);
        key
    }

    /// Re-insert a popped event under its original key, so an outstanding
    /// cancellation handle stays valid across reschedules.
    pub fn requeue(&mut self, key: EventKey, event: Box<dyn Event>) {
        self.push_entry(key, event);
    }

    fn push_entry(&mut self, key: EventKey, event: Box<dyn Event>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(key);
        self.heap.push(Entry {
            time: event.time(),
            seq,
            key,
            event,
        });
    }

    /// The due time of the front event, cancelled or not.
    pub fn next_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|e| e.time)
    }

    /// Remove and return the front event. The cancelled flag is consumed.
    pub fn pop(&mut self) -> Option<PoppedEvent> {
        let entry = self.heap.pop()?;
        self.pending.remove(&entry.key);
        let cancelled = self.cancelled.remove(&entry.key);
        Some(PoppedEvent {
            key: entry.key,
            time: entry.time,
            event: entry.event,
            cancelled,
        })
    }

    /// Soft-cancel a pending event. Returns false when the key is unknown or
    /// the event has already run.
    pub fn cancel(&mut self, key: EventKey) -> bool {
        if self.pending.contains(&key) {
            self.cancelled.insert(key);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drop every pending event. Keys and sequence numbers keep counting.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.pending.clear();
        self.cancelled.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
