//! Notification intake: bounded queue consumed cooperatively, merged into
//! scheduler reschedules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::domain::ports::NotificationSender;
use crate::services::scheduler::Clock;
use crate::services::scheduler::Scheduler;

/// Default number of notifications drained per tick.
pub const MAX_NOTIFICATIONS_PER_TICK: usize = 20;

/// Bounded, non-blocking notification queue shared between the HTTP
/// handlers and the crawler's drain loop.
///
/// Backed by an in-process `tokio::mpsc` channel (see `DESIGN.md` for the
/// scope note on why this is in-process rather than cross-process).
pub struct NotificationQueue {
    tx: mpsc::Sender<String>,
    depth: Arc<AtomicUsize>,
}

pub struct NotificationReceiver {
    rx: mpsc::Receiver<String>,
    depth: Arc<AtomicUsize>,
}

impl NotificationQueue {
    pub fn bounded(max_size: usize) -> (Self, NotificationReceiver) {
        let (tx, rx) = mpsc::channel(max_size.max(1));
        let depth = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                depth: depth.clone(),
            },
            NotificationReceiver { rx, depth },
        )
    }
}

impl NotificationSender for NotificationQueue {
    fn try_notify(&self, repo_id: String) -> bool {
        match self.tx.try_send(repo_id.clone()) {
            Ok(()) => {
                self.depth.fetch_add(1, Ordering::SeqCst);
                true
            }
            Err(_) => {
                warn!(repo_id = %repo_id, "notification dropped, queue is full");
                false
            }
        }
    }

    fn depth(&self) -> Option<usize> {
        Some(self.depth.load(Ordering::SeqCst))
    }
}

/// Drains the queue on a fixed cadence and merges each notification into
/// the scheduler via `reschedule`.
pub struct NotificationDrain {
    receiver: NotificationReceiver,
    notify_min_delay: ChronoDuration,
    overload_warning_threshold: usize,
    max_per_tick: usize,
}

impl NotificationDrain {
    pub fn new(
        receiver: NotificationReceiver,
        notify_min_delay: ChronoDuration,
        overload_warning_threshold: usize,
    ) -> Self {
        Self {
            receiver,
            notify_min_delay,
            overload_warning_threshold,
            max_per_tick: MAX_NOTIFICATIONS_PER_TICK,
        }
    }

    /// Drain up to `max_per_tick` pending notifications into `scheduler`,
    /// returning how many were processed.
    pub fn drain_into<C: Clock>(&mut self, scheduler: &mut Scheduler<C>) -> usize {
        let mut processed = 0;

        while processed < self.max_per_tick {
            match self.receiver.rx.try_recv() {
                Ok(repo_id) => {
                    self.receiver.depth.fetch_sub(1, Ordering::SeqCst);
                    scheduler.reschedule(repo_id.clone(), self.notify_min_delay);
                    info!(repo_id = %repo_id, "received notification");
                    processed += 1;
                }
                Err(_) => break,
            }
        }

        let qsize = self.receiver.depth.load(Ordering::SeqCst);
        if qsize >= self.overload_warning_threshold {
            info!(depth = qsize, "notification queue depth elevated");
        }

        processed
    }

    /// Run the cooperative drain loop forever on `poll_interval`, mutating
    /// the scheduler under `scheduler_mutex` each tick.
    pub async fn run_forever<C: Clock>(
        mut self,
        scheduler: Arc<tokio::sync::Mutex<Scheduler<C>>>,
        poll_interval: std::time::Duration,
    ) {
        loop {
            {
                let mut sched = scheduler.lock().await;
                self.drain_into(&mut sched);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
