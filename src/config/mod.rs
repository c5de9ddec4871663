//! Configuration module for Marksync
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use marksync::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("marksync.toml")).unwrap();
//! println!("Bodies go to bucket: {}", config.body_store.bucket);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BodyStoreConfig, BusConfig, Config, CrawlerConfig, StorageConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{load_config, load_config_with_hash, parse_config};
