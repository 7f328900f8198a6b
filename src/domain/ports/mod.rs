//! Ports: trait boundaries the core depends on, implemented by adapters.

pub mod accounts_client;
pub mod notifier;
pub mod registry;
pub mod repository_client;
pub mod triple_store;

pub use accounts_client::AccountsClient;
pub use notifier::NotificationSender;
pub use registry::Registry;
pub use repository_client::RepositoryClient;
pub use triple_store::{ResultRow, TripleStoreClient};
