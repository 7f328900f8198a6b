//! chubindex - entity/repository index crawl service.
//!
//! Maintains a central graph-shaped index of `(source_id_type, source_id)
//! <-> entity_uri <-> repository_id` plus cross-identifier relations,
//! fed by a persistent, concurrent poller over a fleet of upstream
//! repository services and an accounts directory.

pub mod domain;
pub mod infrastructure;
pub mod services;

pub use infrastructure::database::DatabaseConnection;
