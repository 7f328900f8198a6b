//! Port for the external triple store.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::domain::errors::RemoteError;

/// One row of a SPARQL SELECT result, decoded from the store's CSV response.
pub type ResultRow = BTreeMap<String, String>;

#[async_trait]
pub trait TripleStoreClient: Send + Sync {
    /// Run a SPARQL SELECT query and return its rows.
    async fn run_query(&self, sparql: &str) -> Result<Vec<ResultRow>, RemoteError>;

    /// Run a SPARQL UPDATE (e.g. a DELETE WHERE).
    async fn run_update(&self, sparql: &str) -> Result<(), RemoteError>;

    /// Submit a Turtle document for ingestion.
    async fn store_turtle(&self, turtle: &str) -> Result<(), RemoteError>;

    /// Create the store's namespace. A 409 ("already exists") is success.
    async fn create_namespace(&self) -> Result<(), RemoteError>;
}
