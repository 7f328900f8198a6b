//! Port for the durable repository registry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::RegistryError;
use crate::domain::models::RepositoryRecord;

#[async_trait]
pub trait Registry: Send + Sync {
    /// Fetch a repository record, or `None` if unknown.
    async fn get(&self, id: &str) -> Result<Option<RepositoryRecord>, RegistryError>;

    /// List every known repository id.
    async fn get_all_ids(&self) -> Result<Vec<String>, RegistryError>;

    /// Insert or replace a repository record.
    async fn set(&self, record: RepositoryRecord) -> Result<(), RegistryError>;

    /// Record a failed poll: increments `errors`, leaves `last`/`next` alone.
    async fn fail(
        &self,
        id: &str,
        reason: Option<&str>,
    ) -> Result<RepositoryRecord, RegistryError>;

    /// Record a successful poll: resets `errors`, advances `last`, sets `next`.
    async fn success(
        &self,
        id: &str,
        next_from: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<RepositoryRecord, RegistryError>;
}
