//! Marksync: bookmark sync and archive service core
//!
//! This crate merges independently edited copies of a bookmark into one
//! convergent state and archives the content behind each bookmarked URL,
//! recording every fetch attempt so that each URL ends up with a canonical
//! stored copy.

pub mod body_store;
pub mod bookmark;
pub mod config;
pub mod crawler;
pub mod messaging;
pub mod output;
pub mod storage;
pub mod sync;
pub mod url;

use thiserror::Error;

/// Main error type for Marksync operations
#[derive(Debug, Error)]
pub enum MarksyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Body store error: {0}")]
    BodyStore(#[from] body_store::BodyStoreError),

    #[error("Message bus error: {0}")]
    Bus(#[from] messaging::BusError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Scheme not allowed: {0}")]
    DisallowedScheme(String),

    #[error("URL is not in canonical form: {0}")]
    BadCanonicalisation(String),
}

/// Result type alias for Marksync operations
pub type Result<T> = std::result::Result<T, MarksyncError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use bookmark::{Bookmark, TagTriple, TagTriples};
pub use config::Config;
pub use crawler::{CrawlCoordinator, CrawlDispatcher, CrawlWorker};
pub use url::CanonicalUrl;
