//! Storage module for persisting bookmarks and crawl records
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - URL and bookmark persistence (with tag rows)
//! - Crawl request/response bookkeeping
//! - The "which bookmarked URLs still need a crawl" query

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{BookmarkStore, CrawlRecordStore, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

/// Response headers as stored: lowercased name -> value
pub type Headers = BTreeMap<String, String>;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// One crawl attempt, recorded before any network I/O happens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequestRecord {
    pub crawl_uuid: Uuid,
    pub url_uuid: Uuid,
    pub requested: DateTime<Utc>,
    pub got_response: bool,
}

/// The response half of a crawl attempt that got one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlResponseRecord {
    pub crawl_uuid: Uuid,
    pub body_uuid: Uuid,
    pub headers: Headers,
    pub status_code: u16,
}

/// Aggregate counts over the crawl tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlCounts {
    pub requests: u64,
    pub requests_without_response: u64,
    pub responses: u64,
    pub crawled_urls: u64,
}
