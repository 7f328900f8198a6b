//! Domain model types: plain data, no I/O.

pub mod config;
pub mod feed;
pub mod namespace;
pub mod query;
pub mod repository;
pub mod schedule;

pub use config::Config;
pub use feed::{AccountsRepository, IdentifierFeedPage, IdentifierRecord};
pub use query::{QueryInput, QueryResult, Relation, RepositoryRef};
pub use repository::RepositoryRecord;
pub use schedule::ScheduleEntry;
