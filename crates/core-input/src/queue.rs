//! Fixed-capacity key-event queue between the hook thread and the input
//! consumer.
//!
//! Capacity 256 with drop-oldest overflow: when the consumer stalls, the
//! hook keeps returning in bounded time and the oldest unprocessed keys are
//! sacrificed. Responsiveness outranks perfect echo; a dropped key is
//! counted, never blocked on.

use std::sync::atomic::Ordering;
use std::time::Duration;

use core_events::{KeyEvent, KEYS_DROPPED_OLDEST};

pub const KEY_QUEUE_CAPACITY: usize = 256;

/// Producer half. `Clone` so the hook and tests can hold one each; pushes
/// are wait-free apart from the channel's internal atomics.
#[derive(Clone)]
pub struct KeyQueuePush {
    tx: crossbeam_channel::Sender<KeyEvent>,
    rx: crossbeam_channel::Receiver<KeyEvent>,
}

/// Consumer half, held by exactly one input consumer thread.
pub struct KeyQueuePop {
    rx: crossbeam_channel::Receiver<KeyEvent>,
}

pub struct KeyQueue;

impl KeyQueue {
    pub fn bounded() -> (KeyQueuePush, KeyQueuePop) {
        let (tx, rx) = crossbeam_channel::bounded(KEY_QUEUE_CAPACITY);
        (
            KeyQueuePush {
                tx,
                rx: rx.clone(),
            },
            KeyQueuePop { rx },
        )
    }
}

impl KeyQueuePush {
    /// Push without ever waiting. On overflow the oldest queued event is
    /// discarded to make room; if a concurrent pop races the discard, the
    /// retry slot is free anyway.
    pub fn push(&self, event: KeyEvent) {
        if self.tx.try_send(event).is_ok() {
            return;
        }
        // Full: drop the oldest and retry once.
        let _ = self.rx.try_recv();
        KEYS_DROPPED_OLDEST.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.try_send(event);
    }
}

impl KeyQueuePop {
    /// Block until an event arrives or every producer is gone.
    pub fn recv(&self) -> Option<KeyEvent> {
        self.rx.recv().ok()
    }

    /// Bounded wait, used by consumers that interleave with shutdown checks.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<KeyEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<KeyEvent> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::ModMask;

    #[test]
    fn push_pop_in_order() {
        let (push, pop) = KeyQueue::bounded();
        for vk in 1..=5u16 {
            push.push(KeyEvent::down(vk, ModMask::empty()));
        }
        for vk in 1..=5u16 {
            assert_eq!(pop.recv().unwrap().vk, vk);
        }
    }

    #[test]
    fn overflow_drops_oldest_not_newest() {
        let (push, pop) = KeyQueue::bounded();
        for vk in 0..(KEY_QUEUE_CAPACITY as u16 + 3) {
            push.push(KeyEvent::down(vk, ModMask::empty()));
        }
        // The first three were sacrificed; the head is now vk=3 and the
        // newest event survived.
        assert_eq!(pop.recv().unwrap().vk, 3);
        let mut last = 0;
        while let Some(ev) = pop.try_recv() {
            last = ev.vk;
        }
        assert_eq!(last, KEY_QUEUE_CAPACITY as u16 + 2);
    }

    #[test]
    fn recv_returns_none_when_producers_drop() {
        let (push, pop) = KeyQueue::bounded();
        push.push(KeyEvent::up(7, ModMask::empty()));
        drop(push);
        assert_eq!(pop.recv().unwrap().vk, 7);
        assert!(pop.recv().is_none());
    }
}
