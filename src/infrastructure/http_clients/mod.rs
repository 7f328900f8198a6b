//! Outbound HTTP adapters: the accounts directory, per-repository
//! identifier feeds, and the triple store.

pub mod accounts_client;
pub mod repository_client;
pub mod triple_store_client;

pub use accounts_client::HttpAccountsClient;
pub use repository_client::HttpRepositoryClient;
pub use triple_store_client::HttpTripleStoreClient;
