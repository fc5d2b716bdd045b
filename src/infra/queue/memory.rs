//! In-memory time-ordered event queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Wrapper ordering entries by scheduled time (earliest first) and FIFO within a time.
struct TimedEntry<T> {
    at: u64,
    seq: u64,
    item: T,
}

impl<T> PartialEq for TimedEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<T> Eq for TimedEntry<T> {}

impl<T> PartialOrd for TimedEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for TimedEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for the max-heap: earlier time, then earlier insertion, pops first.
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Queue of items keyed by scheduled time (seconds).
/// Provides O(log n) insertion and extraction.
pub struct EventQueue<T> {
    entries: BinaryHeap<TimedEntry<T>>,
    next_seq: u64,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            entries: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `item` at time `at`. Equal times keep insertion order.
    pub fn put(&mut self, at: u64, item: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(TimedEntry { at, seq, item });
    }

    /// Whether the earliest entry is due at `now`.
    pub fn has_ready(&self, now: u64) -> bool {
        self.entries.peek().is_some_and(|e| e.at <= now)
    }

    /// Remove and return the earliest entry if it is due at `now`.
    pub fn take_ready(&mut self, now: u64) -> Option<(u64, T)> {
        if !self.has_ready(now) {
            return None;
        }
        self.entries.pop().map(|e| (e.at, e.item))
    }

    /// Scheduled time of the earliest entry.
    pub fn next_time(&self) -> Option<u64> {
        self.entries.peek().map(|e| e.at)
    }

    /// Remove every entry in scheduled order.
    pub fn drain(&mut self) -> Vec<(u64, T)> {
        let mut out = Vec::with_capacity(self.entries.len());
        while let Some(e) = self.entries.pop() {
            out.push((e.at, e.item));
        }
        out
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
