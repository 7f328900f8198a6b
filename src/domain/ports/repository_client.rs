//! Port for a single repository's identifier feed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::domain::errors::RemoteError;
use crate::domain::models::IdentifierFeedPage;

#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Fetch one page of identifiers for `repo_id` from `location`, starting
    /// at `from`. Pages are 1-indexed, matching the original feed contract.
    async fn fetch_identifiers_page(
        &self,
        location: &Url,
        repo_id: &str,
        page: u32,
        from: DateTime<Utc>,
    ) -> Result<IdentifierFeedPage, RemoteError>;
}
