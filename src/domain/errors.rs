//! Domain-level errors for the crawl and query subsystems.

use thiserror::Error;

/// Errors surfaced by the durable registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("repository not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed record for repository {id}: {reason}")]
    MalformedRecord { id: String, reason: String },
}

/// Errors from the accounts / repository / triple-store HTTP clients.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response body could not be parsed: {0}")]
    Decode(String),
}

/// Validation errors for one row of an identifier ingest batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("entity_id {0:?} does not match the required pattern")]
    InvalidEntityId(String),

    #[error("source_id_type {0:?} does not match the allowed id-type pattern")]
    InvalidSourceIdType(String),

    #[error("source_id {0:?} does not match the allowed entity-id pattern")]
    InvalidSourceId(String),
}

/// Errors from the bulk query planner.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid query inputs")]
    BadRequest(Vec<crate::domain::models::query::InvalidQueryInput>),

    #[error("no matching entity")]
    NotFound,

    #[error("triple store query failed: {0}")]
    Remote(#[from] RemoteError),
}

/// Configuration errors, fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_poll_error_delay_factor must be >= 1, got {0}")]
    InvalidMaxPollErrorDelayFactor(u32),

    #[error("local_db path must not be empty")]
    EmptyLocalDb,

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("concurrency must be >= 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("max_related_depth must be >= 1, got {0}")]
    InvalidMaxRelatedDepth(u32),

    #[error("figment extraction failed: {0}")]
    Figment(#[from] figment::Error),
}
