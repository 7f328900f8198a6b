//! Port for the bounded notification queue.
//!
//! A trait wrapper around the bounded channel lets the HTTP layer depend on
//! an abstract sender without reaching into `tokio::sync::mpsc` directly.

/// Producer side: never blocks, drops silently on overflow.
pub trait NotificationSender: Send + Sync {
    /// Enqueue a repository id for rescheduling. Returns `false` if the
    /// queue was full and the notification was dropped.
    fn try_notify(&self, repo_id: String) -> bool;

    /// Best-effort current queue depth, for overload warnings.
    fn depth(&self) -> Option<usize>;
}
