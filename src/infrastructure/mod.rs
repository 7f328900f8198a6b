//! Adapters: concrete, I/O-performing implementations of the domain ports.

pub mod config;
pub mod database;
pub mod http;
pub mod http_clients;
pub mod logging;
pub mod sqlite_registry;
