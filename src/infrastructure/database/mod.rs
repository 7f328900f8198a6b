//! Database infrastructure: connection pooling and migrations for the
//! durable repository registry.

pub mod connection;

pub use connection::DatabaseConnection;
