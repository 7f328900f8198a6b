//! Application services: the crawl subsystem and the read-path query planner.

pub mod accounts_poller;
pub mod fetch_manager;
pub mod index_store;
pub mod notification_intake;
pub mod query_planner;
pub mod scheduler;
