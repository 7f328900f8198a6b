//! Wire shapes for the accounts service and per-repository identifier feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single repository entry as listed by the accounts service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountsRepository {
    pub id: String,
    #[serde(default)]
    pub service: Option<AccountsService>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountsService {
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountsRepositoriesResponse {
    pub data: Vec<AccountsRepository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountsRepositoryResponse {
    pub data: AccountsRepository,
}

/// One raw identifier record returned by a repository's identifier feed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentifierRecord {
    pub entity_id: String,
    pub source_id: String,
    pub source_id_type: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct IdentifierFeedMetadata {
    /// `[from, to]` bounds the page's worth of identifiers just returned.
    #[serde(default)]
    pub result_range: Option<(String, String)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentifierFeedPage {
    #[serde(default)]
    pub data: Vec<IdentifierRecord>,
    #[serde(default)]
    pub metadata: IdentifierFeedMetadata,
}

/// Cutoff used when a repository has never been successfully polled.
pub fn default_from_time() -> DateTime<Utc> {
    "2000-01-01T00:00:00Z".parse().expect("valid constant timestamp")
}
