//! Accounts directory HTTP client: `GET {url_accounts}/accounts/repositories`,
//! `GET {url_accounts}/accounts/repositories/{id}`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::domain::errors::RemoteError;
use crate::domain::models::feed::{AccountsRepositoriesResponse, AccountsRepositoryResponse};
use crate::domain::models::AccountsRepository;
use crate::domain::ports::AccountsClient;

pub struct HttpAccountsClient {
    client: Client,
    base_url: String,
}

impl HttpAccountsClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AccountsClient for HttpAccountsClient {
    async fn list_repositories(&self) -> Result<Vec<AccountsRepository>, RemoteError> {
        let url = format!("{}/accounts/repositories", self.base_url);
        let response = self.client.get(&url).send().await?;
        let response = ensure_success(response).await?;
        let body: AccountsRepositoriesResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(body.data)
    }

    async fn get_repository(
        &self,
        id: &str,
    ) -> Result<Option<AccountsRepository>, RemoteError> {
        let url = format!("{}/accounts/repositories/{id}", self.base_url);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        let body: AccountsRepositoryResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(Some(body.data))
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status { status, body })
}
