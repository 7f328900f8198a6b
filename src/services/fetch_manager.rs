//! Fetch manager: drains the scheduler, runs bounded-concurrency per-repo
//! fetches, paginates each repository's identifier feed, and reschedules
//! with backoff.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::join_all;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::models::{feed::default_from_time, RepositoryRecord};
use crate::domain::ports::{AccountsClient, Registry, RepositoryClient, TripleStoreClient};
use crate::services::index_store::IndexStore;
use crate::services::scheduler::{Clock, Scheduler};

const ASSET_ENTITY_TYPE: &str = "asset";

pub struct FetchManagerConfig {
    pub concurrency: usize,
    pub default_poll_interval: ChronoDuration,
    pub max_poll_error_delay_factor: u32,
    pub max_repository_pages: Option<u32>,
    pub open_service: bool,
    pub idle_sleep: StdDuration,
}

pub struct FetchManager<R, A, F, T>
where
    R: Registry,
    A: AccountsClient,
    F: RepositoryClient,
    T: TripleStoreClient,
{
    registry: Arc<R>,
    accounts: Arc<A>,
    repository_client: Arc<F>,
    index_store: Arc<IndexStore<T>>,
    config: FetchManagerConfig,
}

impl<R, A, F, T> FetchManager<R, A, F, T>
where
    R: Registry,
    A: AccountsClient,
    F: RepositoryClient,
    T: TripleStoreClient,
{
    pub fn new(
        registry: Arc<R>,
        accounts: Arc<A>,
        repository_client: Arc<F>,
        index_store: Arc<IndexStore<T>>,
        config: FetchManagerConfig,
    ) -> Self {
        Self {
            registry,
            accounts,
            repository_client,
            index_store,
            config,
        }
    }

    /// Run the main loop forever: `ids <- scheduler.get(concurrency)`, fan
    /// out a `fetch` per id, await the batch, sleep when idle.
    pub async fn fetch_forever<C: Clock>(&self, scheduler: Arc<Mutex<Scheduler<C>>>) {
        loop {
            let ids = scheduler.lock().await.get(self.config.concurrency);

            if ids.is_empty() {
                tokio::time::sleep(self.config.idle_sleep).await;
                continue;
            }

            let futures = ids
                .into_iter()
                .map(|id| self.fetch(id, scheduler.clone()));
            join_all(futures).await;
        }
    }

    /// Fetch one repository's due identifiers and reschedule it. Never
    /// propagates an error past this boundary.
    async fn fetch<C: Clock>(&self, id: String, scheduler: Arc<Mutex<Scheduler<C>>>) {
        let repo = match self.load_repository(&id).await {
            Some(repo) => repo,
            None => return,
        };

        let Some(location) = repo.location.clone() else {
            if let Err(err) = self.registry.fail(&id, Some("unknown location")).await {
                warn!(repo_id = %id, error = %err, "failed to record unknown-location failure");
            }
            self.reschedule_after_update(&id, &scheduler).await;
            return;
        };

        let from_time = repo.next.unwrap_or_else(default_from_time);

        match self.paginate(&location, &id, from_time).await {
            Ok(result_to) => {
                if let Err(err) = self.registry.success(&id, result_to, Utc::now()).await {
                    warn!(repo_id = %id, error = %err, "failed to record successful poll");
                }
            }
            Err(err) => {
                warn!(repo_id = %id, error = %err, "fetch failed, recording failure");
                if let Err(err) = self.registry.fail(&id, Some(&err.to_string())).await {
                    warn!(repo_id = %id, error = %err, "failed to record failed poll");
                }
            }
        }

        self.reschedule_after_update(&id, &scheduler).await;
    }

    /// Resolve an id to a `RepositoryRecord`, consulting the accounts
    /// service for unknown ids when `open_service` is enabled. Returns
    /// `None` (and does not reschedule) for ids that remain unresolvable.
    async fn load_repository(&self, id: &str) -> Option<RepositoryRecord> {
        match self.registry.get(id).await {
            Ok(Some(record)) => return Some(record),
            Ok(None) => {}
            Err(err) => {
                warn!(repo_id = %id, error = %err, "registry lookup failed");
                return None;
            }
        }

        if !self.config.open_service {
            info!(repo_id = %id, "unknown repository, service closed, skipping");
            return None;
        }

        match self.accounts.get_repository(id).await {
            Ok(Some(remote)) => {
                let location = remote
                    .service
                    .as_ref()
                    .and_then(|s| s.location.as_deref())
                    .and_then(|loc| url::Url::parse(loc).ok());
                let record = RepositoryRecord::new(remote.id, location);
                if let Err(err) = self.registry.set(record.clone()).await {
                    warn!(repo_id = %id, error = %err, "failed to persist resolved repository");
                }
                Some(record)
            }
            Ok(None) => {
                info!(repo_id = %id, "unknown repository, not found upstream, skipping");
                None
            }
            Err(err) => {
                warn!(repo_id = %id, error = %err, "accounts lookup failed for unknown repository");
                None
            }
        }
    }

    /// Paginate the repository's identifier feed starting at `from_time`,
    /// submitting each non-empty page to the index store. Returns the
    /// latest `result_to` seen, or `None` if every page was empty.
    async fn paginate(
        &self,
        location: &url::Url,
        repo_id: &str,
        from_time: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, crate::domain::errors::RemoteError> {
        let mut result_to = None;
        let mut page = 1u32;

        loop {
            let feed_page = self
                .repository_client
                .fetch_identifiers_page(location, repo_id, page, from_time)
                .await?;

            if feed_page.data.is_empty() {
                break;
            }

            self.index_store
                .add_entities(ASSET_ENTITY_TYPE, &feed_page.data, repo_id)
                .await;

            if let Some((_, to)) = feed_page.metadata.result_range {
                if let Ok(parsed) = to.parse::<DateTime<Utc>>() {
                    result_to = Some(parsed);
                }
            }

            if let Some(cap) = self.config.max_repository_pages {
                if page >= cap {
                    break;
                }
            }

            page += 1;
        }

        Ok(result_to)
    }

    async fn reschedule_after_update<C: Clock>(
        &self,
        id: &str,
        scheduler: &Arc<Mutex<Scheduler<C>>>,
    ) {
        let errors = match self.registry.get(id).await {
            Ok(Some(record)) => record.errors,
            _ => 0,
        };

        let delay = self.next_poll_interval(errors);
        scheduler.lock().await.schedule(id.to_string(), Some(delay));
    }

    /// `delay_factor * U(0.5I, I)` where `delay_factor = min(max(errors,1),
    /// max_poll_error_delay_factor)` and `I = default_poll_interval`.
    fn next_poll_interval(&self, errors: u32) -> ChronoDuration {
        let delay_factor = errors.max(1).min(self.config.max_poll_error_delay_factor);
        let interval_ms = self.config.default_poll_interval.num_milliseconds().max(1);
        let lower = interval_ms / 2;
        let jittered_ms = rand::thread_rng().gen_range(lower..=interval_ms);
        ChronoDuration::milliseconds(jittered_ms * i64::from(delay_factor))
    }
}
