use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Marksync
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    #[serde(rename = "body-store")]
    pub body_store: BodyStoreConfig,
    pub bus: BusConfig,
}

/// Crawl worker behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Timeout for one fetch, body included (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum number of fetches a worker runs at once
    #[serde(rename = "max-concurrent-fetches", default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: u32,

    /// How long an idle worker waits before polling the bus again (milliseconds)
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Largest decoded response body a crawl keeps (bytes)
    #[serde(rename = "max-body-bytes", default = "default_max_body_bytes")]
    pub max_body_bytes: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_fetches() -> u32 {
    4
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_body_bytes() -> u64 {
    crate::crawler::DEFAULT_MAX_BODY_BYTES
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            poll_interval_ms: default_poll_interval_ms(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the `User-Agent` header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Relational store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Blob store for crawled bodies
#[derive(Debug, Clone, Deserialize)]
pub struct BodyStoreConfig {
    /// Directory holding one sub-directory per bucket
    pub root: String,

    /// Bucket crawled bodies are written to
    pub bucket: String,
}

/// Message bus configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Path to the SQLite file backing the bus
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Topic crawl work is published to and consumed from
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Seconds a received message stays hidden before redelivery
    #[serde(rename = "lease-secs", default = "default_lease_secs")]
    pub lease_secs: u64,
}

fn default_topic() -> String {
    "bg-worker".to_string()
}

fn default_lease_secs() -> u64 {
    300
}

impl BusConfig {
    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }
}
