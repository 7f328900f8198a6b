//! Priority scheduler: a min-heap of due-times with lazy tombstoning and
//! de-duplicated rescheduling.
//!
//! Owned exclusively by the fetch-manager task (see `services::fetch_manager`);
//! none of its methods perform I/O or await, so no lock is ever held across a
//! suspension point.

use std::collections::{BinaryHeap, HashMap};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;

use crate::domain::models::schedule::ScheduleEntry;

/// Clock abstraction so tests can control "now" deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Live-entry record kept in the dedup map: due time and heap sequence.
#[derive(Debug, Clone, Copy)]
struct LiveEntry {
    due: DateTime<Utc>,
    seq: u64,
}

/// Min-heap priority scheduler keyed on due-time.
pub struct Scheduler<C: Clock = SystemClock> {
    heap: BinaryHeap<ScheduleEntry>,
    live: HashMap<String, LiveEntry>,
    next_seq: u64,
    default_poll_interval: ChronoDuration,
    clock: C,
}

impl Scheduler<SystemClock> {
    pub fn new(default_poll_interval: ChronoDuration) -> Self {
        Self::with_clock(default_poll_interval, SystemClock)
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn with_clock(default_poll_interval: ChronoDuration, clock: C) -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            next_seq: 0,
            default_poll_interval,
            clock,
        }
    }

    /// Schedule `repo_id` to become due after `delay`. A `None` delay picks
    /// a uniform random delay in `[0, default_poll_interval)` ("not urgent"
    /// default-poll mode).
    ///
    /// Any existing live entry for `repo_id` is tombstoned before the new
    /// one is pushed, so at most one live entry per id ever exists.
    pub fn schedule(&mut self, repo_id: impl Into<String>, delay: Option<ChronoDuration>) {
        let repo_id = repo_id.into();
        let delay = delay.unwrap_or_else(|| self.random_default_delay());
        let due = self.clock.now() + delay;
        self.push(repo_id, due);
    }

    /// Reschedule `repo_id` to become due after `delay`, but only if doing
    /// so would move its due-time earlier than what's already pending.
    /// Never delays a pending entry. Delegates to `schedule` when it does act.
    pub fn reschedule(&mut self, repo_id: impl Into<String>, delay: ChronoDuration) {
        let repo_id = repo_id.into();
        let now = self.clock.now();
        let candidate_due = now + delay;

        let should_act = match self.live.get(&repo_id) {
            Some(entry) => entry.due > candidate_due,
            None => true,
        };

        if should_act {
            self.push(repo_id, candidate_due);
        }
    }

    /// Return up to `n` repository ids whose due-time has arrived, in
    /// non-decreasing due-time order. Never blocks. Tombstoned entries are
    /// popped and silently discarded without counting against `n`.
    pub fn get(&mut self, n: usize) -> Vec<String> {
        let now = self.clock.now();
        let mut out = Vec::with_capacity(n.min(self.heap.len()));

        while out.len() < n {
            let Some(top) = self.heap.peek() else {
                break;
            };
            if top.due > now {
                break;
            }
            let entry = self.heap.pop().expect("peeked entry must pop");

            if entry.tombstone {
                continue;
            }

            // A pop always removes the single live entry recorded for this
            // id (schedule/reschedule tombstone any prior one), so the live
            // map entry is cleared here rather than left stale.
            if let Some(live) = self.live.get(&entry.repo_id) {
                if live.seq == entry.seq {
                    self.live.remove(&entry.repo_id);
                }
            }

            out.push(entry.repo_id);
        }

        out
    }

    /// Number of entries still resident in the heap, tombstoned or not.
    /// Exposed for tests asserting no unbounded growth under schedule churn.
    #[cfg(test)]
    pub(crate) fn heap_len(&self) -> usize {
        self.heap.len()
    }

    fn push(&mut self, repo_id: String, due: DateTime<Utc>) {
        if let Some(prev) = self.live.get(&repo_id) {
            self.tombstone(&repo_id, prev.seq);
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        self.heap.push(ScheduleEntry::new(repo_id.clone(), due, seq));
        self.live.insert(repo_id, LiveEntry { due, seq });
    }

    /// Mark the heap entry with the given `(repo_id, seq)` as tombstoned.
    ///
    /// `BinaryHeap` doesn't support in-place mutation of arbitrary elements,
    /// so this rebuilds the heap once. Churn on a single id is expected to
    /// be rare relative to `get()` calls, and the rebuild is O(heap size).
    fn tombstone(&mut self, repo_id: &str, seq: u64) {
        let mut items: Vec<ScheduleEntry> = self.heap.drain().collect();
        for item in &mut items {
            if item.repo_id == repo_id && item.seq == seq {
                item.tombstone = true;
            }
        }
        self.heap = items.into_iter().collect();
    }

    fn random_default_delay(&self) -> ChronoDuration {
        let max_ms = self.default_poll_interval.num_milliseconds().max(1);
        let ms = rand::thread_rng().gen_range(0..max_ms);
        ChronoDuration::milliseconds(ms)
    }
}
