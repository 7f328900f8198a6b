//! Domain layer: models, ports, and error types. No I/O lives here.

pub mod errors;
pub mod models;
pub mod ports;
