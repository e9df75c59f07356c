//! One-shot event scheduler over a monotonic clock.
//!
//! The scheduler only stores events; they fire when the owner of the event
//! loop pumps [`Scheduler::pop_due`]. Events expire in non-decreasing
//! deadline order, ties broken by insertion order.

use crate::clock::Clock;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

type EventCallback = Box<dyn FnOnce()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EventKey {
    expiry: Instant,
    seq: u64,
}

struct Inner {
    clock: Rc<dyn Clock>,
    queue: BTreeMap<EventKey, EventCallback>,
    next_seq: u64,
}

/// Cheap cloneable handle to a scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<Inner>>,
}

impl Scheduler {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                clock,
                queue: BTreeMap::new(),
                next_seq: 0,
            })),
        }
    }

    /// Schedules a one-time event after `delay`.
    ///
    /// The callback runs from the thread pumping the event loop, never from
    /// within `schedule` itself. The returned [`EventId`] cancels the event
    /// when dropped unless released.
    pub fn schedule(&self, delay: Duration, callback: impl FnOnce() + 'static) -> EventId {
        let mut inner = self.inner.borrow_mut();
        let key = EventKey {
            expiry: inner.clock.now() + delay,
            seq: inner.next_seq,
        };
        inner.next_seq += 1;
        inner.queue.insert(key, Box::new(callback));
        EventId {
            key: Some(key),
            scheduler: Rc::downgrade(&self.inner),
        }
    }

    /// Cancels every scheduled event.
    pub fn cancel_all(&self) {
        self.inner.borrow_mut().queue.clear();
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.borrow().queue.is_empty()
    }

    /// Deadline of the earliest scheduled event.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.inner.borrow().queue.keys().next().map(|k| k.expiry)
    }

    /// Removes and returns the callback of the next expired event, if any.
    ///
    /// The caller invokes the callback after the scheduler borrow is gone,
    /// so the callback is free to schedule or cancel further events.
    pub(crate) fn pop_due(&self) -> Option<EventCallback> {
        let mut inner = self.inner.borrow_mut();
        let now = inner.clock.now();
        let key = *inner.queue.keys().next()?;
        if key.expiry > now {
            return None;
        }
        inner.queue.remove(&key)
    }
}

/// A scoped handle for a scheduled event.
///
/// Dropping the handle cancels the event unless [`EventId::release`] was
/// called. Cancelling an expired or already-cancelled event is a no-op.
#[derive(Default)]
pub struct EventId {
    key: Option<EventKey>,
    scheduler: Weak<RefCell<Inner>>,
}

impl EventId {
    /// Cancels the event. Idempotent.
    pub fn cancel(&mut self) {
        if let (Some(key), Some(inner)) = (self.key.take(), self.scheduler.upgrade()) {
            inner.borrow_mut().queue.remove(&key);
        }
    }

    /// Disarms this handle without cancelling the event.
    pub fn release(&mut self) {
        self.key = None;
        self.scheduler = Weak::new();
    }
}

impl Drop for EventId {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventId")
            .field("armed", &self.key.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::cell::RefCell;

    fn pump(scheduler: &Scheduler) {
        while let Some(callback) = scheduler.pop_due() {
            callback();
        }
    }

    fn fixture() -> (Rc<ManualClock>, Scheduler) {
        let clock = ManualClock::new();
        let scheduler = Scheduler::new(clock.clone());
        (clock, scheduler)
    }

    #[test]
    fn fires_in_deadline_order_with_insertion_ties() {
        let (clock, scheduler) = fixture();
        let fired = Rc::new(RefCell::new(Vec::new()));

        let mut ids = Vec::new();
        for (label, delay_ms) in [("b", 20), ("a1", 10), ("a2", 10), ("c", 30)] {
            let fired = Rc::clone(&fired);
            let mut id = scheduler.schedule(Duration::from_millis(delay_ms), move || {
                fired.borrow_mut().push(label);
            });
            id.release();
            ids.push(id);
        }

        clock.advance(Duration::from_millis(25));
        pump(&scheduler);
        assert_eq!(*fired.borrow(), vec!["a1", "a2", "b"]);

        clock.advance(Duration::from_millis(10));
        pump(&scheduler);
        assert_eq!(*fired.borrow(), vec!["a1", "a2", "b", "c"]);
    }

    #[test]
    fn does_not_fire_early() {
        let (clock, scheduler) = fixture();
        let fired = Rc::new(Cell::new(false));
        let fired2 = Rc::clone(&fired);
        let mut id = scheduler.schedule(Duration::from_millis(10), move || fired2.set(true));
        id.release();

        clock.advance(Duration::from_millis(9));
        pump(&scheduler);
        assert!(!fired.get());

        clock.advance(Duration::from_millis(1));
        pump(&scheduler);
        assert!(fired.get());
    }

    use std::cell::Cell;

    #[test]
    fn cancel_prevents_firing_and_is_idempotent() {
        let (clock, scheduler) = fixture();
        let fired = Rc::new(Cell::new(false));
        let fired2 = Rc::clone(&fired);
        let mut id = scheduler.schedule(Duration::ZERO, move || fired2.set(true));

        id.cancel();
        id.cancel();
        clock.advance(Duration::from_millis(1));
        pump(&scheduler);
        assert!(!fired.get());
    }

    #[test]
    fn dropping_event_id_cancels() {
        let (clock, scheduler) = fixture();
        let fired = Rc::new(Cell::new(false));
        let fired2 = Rc::clone(&fired);
        drop(scheduler.schedule(Duration::ZERO, move || fired2.set(true)));

        clock.advance(Duration::from_millis(1));
        pump(&scheduler);
        assert!(!fired.get());
    }

    #[test]
    fn callback_may_schedule_more_events() {
        let (clock, scheduler) = fixture();
        let fired = Rc::new(Cell::new(0u32));

        let scheduler2 = scheduler.clone();
        let fired2 = Rc::clone(&fired);
        let mut id = scheduler.schedule(Duration::ZERO, move || {
            fired2.set(fired2.get() + 1);
            let fired3 = Rc::clone(&fired2);
            let mut inner = scheduler2.schedule(Duration::ZERO, move || {
                fired3.set(fired3.get() + 1);
            });
            inner.release();
        });
        id.release();

        clock.advance(Duration::from_millis(1));
        pump(&scheduler);
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn cancel_all_clears_queue() {
        let (clock, scheduler) = fixture();
        let fired = Rc::new(Cell::new(false));
        let fired2 = Rc::clone(&fired);
        let mut id = scheduler.schedule(Duration::ZERO, move || fired2.set(true));
        id.release();

        scheduler.cancel_all();
        assert!(!scheduler.has_pending());
        clock.advance(Duration::from_millis(1));
        pump(&scheduler);
        assert!(!fired.get());
    }
}
