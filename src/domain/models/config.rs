//! Top-level configuration structure, loaded hierarchically by
//! [`crate::infrastructure::config::ConfigLoader`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub url_accounts: String,
    pub accounts_poll_interval_secs: u64,
    pub default_poll_interval_secs: u64,
    pub max_poll_error_delay_factor: u32,
    pub notification_poll_interval_ms: u64,
    pub notify_min_delay_secs: u64,
    pub notify_queue_overload_warning: usize,
    pub notifications_queue_max_size: usize,
    pub concurrency: usize,
    pub max_repository_pages: Option<u32>,
    pub open_service: bool,
    pub max_related_depth: u32,
    pub local_db: String,
    pub index_db: IndexDbConfig,
    pub logging: LoggingConfig,
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url_accounts: "http://localhost:8001".to_string(),
            accounts_poll_interval_secs: 60 * 60 * 24,
            default_poll_interval_secs: 60 * 60 * 6,
            max_poll_error_delay_factor: 5,
            notification_poll_interval_ms: 100,
            notify_min_delay_secs: (60 * 60 * 6) / 10,
            notify_queue_overload_warning: 2,
            notifications_queue_max_size: 1000,
            concurrency: 2,
            max_repository_pages: None,
            open_service: true,
            max_related_depth: 5,
            local_db: ".chubindex/registry.db".to_string(),
            index_db: IndexDbConfig::default(),
            logging: LoggingConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexDbConfig {
    pub url_index_db: String,
    pub index_db_port: u16,
    pub index_db_path: String,
    pub index_schema: String,
}

impl Default for IndexDbConfig {
    fn default() -> Self {
        Self {
            url_index_db: "http://localhost".to_string(),
            index_db_port: 9999,
            index_db_path: "/bigdata/namespace/".to_string(),
            index_schema: "kb".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}
