//! Scheduler entry types.

use chrono::{DateTime, Utc};

/// One entry in the scheduler's min-heap.
///
/// `seq` is a monotonic counter assigned at push time; it exists only to
/// give equal-due-time entries a deterministic pop order (ties are broken
/// by insertion order) and plays no role in tombstoning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub repo_id: String,
    pub due: DateTime<Utc>,
    pub seq: u64,
    pub tombstone: bool,
}

impl ScheduleEntry {
    pub fn new(repo_id: String, due: DateTime<Utc>, seq: u64) -> Self {
        Self {
            repo_id,
            due,
            seq,
            tombstone: false,
        }
    }
}

/// Ordering for the min-heap: earliest `due` first, ties by `seq`.
///
/// `std::collections::BinaryHeap` is a max-heap, so the `Ord` impl is
/// reversed relative to the natural field order to make the heap behave as
/// a min-heap on `due`.
impl Ord for ScheduleEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduleEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
