#![forbid(unsafe_code)]

//! Deadline queue for the engine's delayed transitions.
//!
//! The engine never reads a clock. Callers pass `now` into every entry point,
//! scheduled work lands here, and the host fires it by calling
//! [`Engine::advance`](crate::Engine::advance) once [`TimerQueue::next_deadline`]
//! has passed. Timers are never cancelled: each carries the generation it was
//! scheduled under and is discarded on firing if that generation has moved on.

use core::cmp::Ordering;
use core::time::Duration;
use std::collections::BinaryHeap;

/// Delayed work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind<N> {
    /// Appearance delay elapsed for a surface in `Appearing`.
    Appear { surface: N, generation: u64 },
    /// Blur debounce elapsed for a surface in `Visible`.
    BlurSettle { surface: N, generation: u64 },
    /// Fade-out finished for a surface in `FadingOut`.
    FadeComplete { surface: N, generation: u64 },
    /// Post-close restore of the focused target's overlay.
    Restore { surface: N, modal_generation: u64 },
    /// Coalesced scroll/resize reposition.
    RepositionFlush,
}

#[derive(Debug)]
struct Entry<N> {
    at: Duration,
    seq: u64,
    kind: TimerKind<N>,
}

impl<N> PartialEq for Entry<N> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<N> Eq for Entry<N> {}

impl<N> PartialOrd for Entry<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<N> Ord for Entry<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on (deadline, insertion order).
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of pending timers, FIFO among equal deadlines.
#[derive(Debug)]
pub struct TimerQueue<N> {
    heap: BinaryHeap<Entry<N>>,
    next_seq: u64,
}

impl<N> Default for TimerQueue<N> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<N> TimerQueue<N> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` to fire at `at`.
    pub fn schedule(&mut self, at: Duration, kind: TimerKind<N>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { at, seq, kind });
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.heap.peek().map(|e| e.at)
    }

    /// Pop the earliest timer if it is due at `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<(Duration, TimerKind<N>)> {
        if self.heap.peek()?.at > now {
            return None;
        }
        self.heap.pop().map(|e| (e.at, e.kind))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
