//! Bounded single-producer, single-consumer handoff queue.
//!
//! A fixed-capacity ring guarded by one mutex and two wait conditions.
//! `push` blocks while the ring is full, `pop` blocks while it is empty.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};

struct Ring<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    fn put(&mut self, value: T) {
        let tail = (self.head + self.len) % self.slots.len();
        self.slots[tail] = Some(value);
        self.len += 1;
    }

    fn take(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let value = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        value
    }
}

pub struct BoundedQueue<T> {
    ring: Mutex<Ring<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    approx_len: AtomicUsize,
}

impl<T> BoundedQueue<T> {
    /// A queue holding at most `capacity` items. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring::with_capacity(capacity.max(1))),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            approx_len: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().slots.len()
    }

    /// Append `value`, waiting for a free slot.
    pub fn push(&self, value: T) {
        let mut ring = self.ring.lock();
        while ring.is_full() {
            self.not_full.wait(&mut ring);
        }
        ring.put(value);
        self.approx_len.store(ring.len, Ordering::Relaxed);
        drop(ring);
        self.not_empty.notify_one();
    }

    /// Remove the oldest item, waiting for one to arrive.
    pub fn pop(&self) -> T {
        let mut ring = self.ring.lock();
        let value = loop {
            if let Some(value) = ring.take() {
                break value;
            }
            self.not_empty.wait(&mut ring);
        };
        self.approx_len.store(ring.len, Ordering::Relaxed);
        drop(ring);
        self.not_full.notify_one();
        value
    }

    /// Remove the oldest item if there is one, without waiting.
    pub fn try_pop(&self) -> Option<T> {
        let mut ring = self.ring.lock();
        let value = ring.take();
        self.approx_len.store(ring.len, Ordering::Relaxed);
        drop(ring);
        if value.is_some() {
            self.not_full.notify_one();
        }
        value
    }

    /// Inexact item count, read without taking the lock.
    ///
    /// Called from the consumer, the queue holds at least this many items;
    /// called from the producer, at most this many. Never use it to decide
    /// whether a `pop` or `push` would block.
    pub fn approx_len(&self) -> usize {
        self.approx_len.load(Ordering::Relaxed)
    }
}
