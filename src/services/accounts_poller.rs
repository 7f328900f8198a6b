//! Accounts poller: periodically lists repositories known to the accounts
//! service and registers any the registry hasn't seen yet.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::domain::models::RepositoryRecord;
use crate::domain::ports::{AccountsClient, Registry};
use crate::services::scheduler::{Clock, Scheduler};

pub struct AccountsPoller<A: AccountsClient, R: Registry> {
    accounts: Arc<A>,
    registry: Arc<R>,
}

impl<A: AccountsClient, R: Registry> AccountsPoller<A, R> {
    pub fn new(accounts: Arc<A>, registry: Arc<R>) -> Self {
        Self { accounts, registry }
    }

    /// One poll cycle: list repositories, register anything unknown, and
    /// schedule newly observed repositories for a random-delay first poll.
    ///
    /// Never propagates an error: a failed listing is logged and skipped,
    /// so the poller ticks forever regardless of transient upstream errors.
    pub async fn tick<C: Clock>(&self, scheduler: &Mutex<Scheduler<C>>) {
        let repositories = match self.accounts.list_repositories().await {
            Ok(repos) => repos,
            Err(err) => {
                error!(error = %err, "accounts listing failed, skipping this tick");
                return;
            }
        };

        for repo in repositories {
            let known = match self.registry.get(&repo.id).await {
                Ok(record) => record.is_some(),
                Err(err) => {
                    error!(repo_id = %repo.id, error = %err, "registry lookup failed");
                    continue;
                }
            };

            if known {
                continue;
            }

            let location = repo
                .service
                .as_ref()
                .and_then(|s| s.location.as_deref())
                .and_then(|loc| url::Url::parse(loc).ok());

            let record = RepositoryRecord::new(repo.id.clone(), location);
            if let Err(err) = self.registry.set(record).await {
                error!(repo_id = %repo.id, error = %err, "failed to register new repository");
                continue;
            }

            info!(repo_id = %repo.id, "registered new repository");
            scheduler.lock().await.schedule(repo.id, None);
        }
    }

    /// Run `tick` forever on `poll_interval`.
    pub async fn run_forever<C: Clock>(
        self,
        scheduler: Arc<Mutex<Scheduler<C>>>,
        poll_interval: std::time::Duration,
    ) {
        loop {
            self.tick(&scheduler).await;
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{RegistryError, RemoteError};
    use crate::domain::models::AccountsRepository;
    use crate::services::scheduler::SystemClock;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex as StdMutex;

    struct StubAccounts(Vec<AccountsRepository>);

    #[async_trait]
    impl AccountsClient for StubAccounts {
        async fn list_repositories(&self) -> Result<Vec<AccountsRepository>, RemoteError> {
            Ok(self.0.clone())
        }

        async fn get_repository(
            &self,
            _id: &str,
        ) -> Result<Option<AccountsRepository>, RemoteError> {
            unimplemented!("not exercised by these tests")
        }
    }

    #[derive(Default)]
    struct InMemoryRegistry(StdMutex<std::collections::HashMap<String, RepositoryRecord>>);

    #[async_trait]
    impl Registry for InMemoryRegistry {
        async fn get(&self, id: &str) -> Result<Option<RepositoryRecord>, RegistryError> {
            Ok(self.0.lock().unwrap().get(id).cloned())
        }

        async fn get_all_ids(&self) -> Result<Vec<String>, RegistryError> {
            Ok(self.0.lock().unwrap().keys().cloned().collect())
        }

        async fn set(&self, record: RepositoryRecord) -> Result<(), RegistryError> {
            self.0.lock().unwrap().insert(record.id.clone(), record);
            Ok(())
        }

        async fn fail(
            &self,
            _id: &str,
            _reason: Option<&str>,
        ) -> Result<RepositoryRecord, RegistryError> {
            unimplemented!()
        }

        async fn success(
            &self,
            _id: &str,
            _next_from: Option<DateTime<Utc>>,
            _now: DateTime<Utc>,
        ) -> Result<RepositoryRecord, RegistryError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn registers_and_schedules_unknown_repositories() {
        let accounts = Arc::new(StubAccounts(vec![AccountsRepository {
            id: "repo-a".to_string(),
            service: None,
        }]));
        let registry = Arc::new(InMemoryRegistry::default());
        let poller = AccountsPoller::new(accounts, registry.clone());
        let scheduler = Mutex::new(Scheduler::with_clock(
            chrono::Duration::seconds(3600),
            SystemClock,
        ));

        poller.tick(&scheduler).await;

        assert!(registry.get("repo-a").await.unwrap().is_some());
        // scheduled with a random default delay, somewhere in the future
        assert_eq!(scheduler.lock().await.get(10), Vec::<String>::new());
    }

    #[tokio::test]
    async fn does_not_reregister_known_repositories() {
        let accounts = Arc::new(StubAccounts(vec![AccountsRepository {
            id: "repo-a".to_string(),
            service: None,
        }]));
        let registry = Arc::new(InMemoryRegistry::default());
        registry
            .set(RepositoryRecord::new("repo-a", None))
            .await
            .unwrap();
        let poller = AccountsPoller::new(accounts, registry.clone());
        let scheduler = Mutex::new(Scheduler::with_clock(
            chrono::Duration::seconds(3600),
            SystemClock,
        ));

        poller.tick(&scheduler).await;

        // untouched: still zero successful_queries, no reschedule happened
        let record = registry.get("repo-a").await.unwrap().unwrap();
        assert_eq!(record.successful_queries, 0);
    }
}
