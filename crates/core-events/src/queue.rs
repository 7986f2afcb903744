//! Fixed-capacity keyboard event ring.
//!
//! Single producer (the keyboard driver), single consumer (the main loop).
//! When the ring is full, pushes are dropped silently; losing a keystroke
//! under burst is preferable to blocking the input path.

use crate::{EventKind, KeyEvent};

/// Ring capacity. One slot is sacrificed to distinguish full from empty.
pub const EVENT_QUEUE_CAPACITY: usize = 32;

/// An entry as recorded by the dispatcher. Hotkey firings carry the action
/// name that was executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedEvent {
    pub kind: EventKind,
    pub event: KeyEvent,
    pub action: Option<String>,
}

impl QueuedEvent {
    pub fn key(event: KeyEvent) -> Self {
        Self {
            kind: EventKind::KeyPressed,
            event,
            action: None,
        }
    }

    pub fn hotkey(event: KeyEvent, action: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Hotkey,
            event,
            action: Some(action.into()),
        }
    }
}

pub struct EventQueue {
    slots: Vec<Option<QueuedEvent>>,
    head: usize,
    tail: usize,
    dropped: u64,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            slots: (0..EVENT_QUEUE_CAPACITY).map(|_| None).collect(),
            head: 0,
            tail: 0,
            dropped: 0,
        }
    }

    /// Push an event. Dropped silently when the ring is full.
    pub fn push(&mut self, event: QueuedEvent) {
        let next = (self.head + 1) % EVENT_QUEUE_CAPACITY;
        if next == self.tail {
            self.dropped += 1;
            tracing::trace!(target: "input", dropped = self.dropped, "event ring full");
            return;
        }
        self.slots[self.head] = Some(event);
        self.head = next;
    }

    pub fn pop(&mut self) -> Option<QueuedEvent> {
        if self.tail == self.head {
            return None;
        }
        let event = self.slots[self.tail].take();
        self.tail = (self.tail + 1) % EVENT_QUEUE_CAPACITY;
        event
    }

    pub fn is_empty(&self) -> bool {
        self.tail == self.head
    }

    pub fn len(&self) -> usize {
        (self.head + EVENT_QUEUE_CAPACITY - self.tail) % EVENT_QUEUE_CAPACITY
    }

    /// Number of events dropped because the ring was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Discard everything (test hook).
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.tail = 0;
        self.dropped = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyCode;

    fn key(code: KeyCode) -> QueuedEvent {
        QueuedEvent::key(KeyEvent::new(code))
    }

    #[test]
    fn fifo_order_preserved() {
        let mut q = EventQueue::new();
        q.push(key(KeyCode::A));
        q.push(key(KeyCode::B));
        q.push(key(KeyCode::C));
        assert_eq!(q.pop().unwrap().event.code, KeyCode::A);
        assert_eq!(q.pop().unwrap().event.code, KeyCode::B);
        assert_eq!(q.pop().unwrap().event.code, KeyCode::C);
        assert!(q.pop().is_none());
    }

    #[test]
    fn full_ring_drops_silently() {
        let mut q = EventQueue::new();
        for _ in 0..EVENT_QUEUE_CAPACITY + 10 {
            q.push(key(KeyCode::A));
        }
        assert_eq!(q.len(), EVENT_QUEUE_CAPACITY - 1);
        assert_eq!(q.dropped(), 11);
        // drain fully; no stale entries afterwards
        let mut drained = 0;
        while q.pop().is_some() {
            drained += 1;
        }
        assert_eq!(drained, EVENT_QUEUE_CAPACITY - 1);
        assert!(q.is_empty());
    }

    #[test]
    fn wrap_around_keeps_events_intact() {
        let mut q = EventQueue::new();
        for round in 0..3 {
            for _ in 0..EVENT_QUEUE_CAPACITY / 2 {
                q.push(key(KeyCode::X));
            }
            for _ in 0..EVENT_QUEUE_CAPACITY / 2 {
                assert!(q.pop().is_some(), "round {round}");
            }
            assert!(q.is_empty());
        }
    }
}
