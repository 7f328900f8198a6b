//! Per-repository identifier feed HTTP client: `GET
//! {location}/repository/repositories/{id}/assets/identifiers?page=N&from=ISO8601`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use url::Url;

use crate::domain::errors::RemoteError;
use crate::domain::models::IdentifierFeedPage;
use crate::domain::ports::RepositoryClient;

pub struct HttpRepositoryClient {
    client: Client,
}

impl HttpRepositoryClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RepositoryClient for HttpRepositoryClient {
    async fn fetch_identifiers_page(
        &self,
        location: &Url,
        repo_id: &str,
        page: u32,
        from: DateTime<Utc>,
    ) -> Result<IdentifierFeedPage, RemoteError> {
        let mut url = location
            .join(&format!("repository/repositories/{repo_id}/assets/identifiers"))
            .map_err(|e| RemoteError::Decode(format!("invalid repository location: {e}")))?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("from", &from.to_rfc3339());

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status { status, body });
        }

        response
            .json::<IdentifierFeedPage>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}
