use std::cmp::{ Ordering, Reverse };
use std::collections::BinaryHeap;
use tokio::time::{ Duration, Instant };

struct Scheduled<T> {
    due: Instant,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

/// Deferred tasks for one single-threaded session.
///
/// Tasks come out ordered by due instant, ties broken by the order they were
/// scheduled in. Nothing runs on its own: the owner polls with `pop_due` from
/// its event loop, or fast-forwards with `pop_next`.
pub struct Scheduler<T> {
    queue: BinaryHeap<Reverse<Scheduled<T>>>,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self { queue: BinaryHeap::new(), next_seq: 0 }
    }

    pub fn schedule(&mut self, now: Instant, delay: Duration, task: T) -> Instant {
        let due = now + delay;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Scheduled { due, seq, task }));
        due
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.queue.peek().map(|Reverse(s)| s.due)
    }

    /// Earliest task whose due instant is not after `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(Instant, T)> {
        match self.next_due() {
            Some(due) if due <= now => self.pop_next(),
            _ => None,
        }
    }

    /// Earliest task regardless of the clock.
    pub fn pop_next(&mut self) -> Option<(Instant, T)> {
        self.queue.pop().map(|Reverse(s)| (s.due, s.task))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
