//! Port for the external accounts directory service.

use async_trait::async_trait;

use crate::domain::errors::RemoteError;
use crate::domain::models::AccountsRepository;

#[async_trait]
pub trait AccountsClient: Send + Sync {
    /// List every repository currently registered with the accounts service.
    async fn list_repositories(&self) -> Result<Vec<AccountsRepository>, RemoteError>;

    /// Look up a single repository by id; `Ok(None)` on a 404.
    async fn get_repository(
        &self,
        id: &str,
    ) -> Result<Option<AccountsRepository>, RemoteError>;
}
