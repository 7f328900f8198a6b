//! Repository metadata known to the crawl subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Durable per-repository state, one row per known repository service.
///
/// Created the first time a repository is observed from the accounts
/// service; never deleted by the core (see the open question in
/// `DESIGN.md` about repository removal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub id: String,
    pub location: Option<Url>,
    /// Lower bound for the next identifier query window.
    pub next: Option<DateTime<Utc>>,
    /// Time of the last successful poll.
    pub last: Option<DateTime<Utc>>,
    /// Consecutive failures since the last success.
    pub errors: u32,
    /// Lifetime count of successful polls.
    pub successful_queries: u64,
}

impl RepositoryRecord {
    /// A freshly observed repository with no history yet.
    pub fn new(id: impl Into<String>, location: Option<Url>) -> Self {
        Self {
            id: id.into(),
            location,
            next: None,
            last: None,
            errors: 0,
            successful_queries: 0,
        }
    }

    /// Apply a successful poll: reset errors, advance `last`, set `next`.
    pub fn mark_success(&mut self, next_from: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        self.errors = 0;
        self.last = Some(now);
        self.next = next_from.or(self.next);
        self.successful_queries += 1;
    }

    /// Apply a failed poll: increment errors, leave `last`/`next` untouched.
    pub fn mark_failure(&mut self) {
        self.errors += 1;
    }
}
