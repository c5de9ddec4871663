//! Storage traits and error types
//!
//! This module defines the trait interfaces for storage backends and
//! associated error types. The crawl pipeline only depends on
//! [`CrawlRecordStore`]; the sync flow only depends on [`BookmarkStore`].

use crate::bookmark::Bookmark;
use crate::storage::{CrawlCounts, CrawlRequestRecord, CrawlResponseRecord, Headers};
use crate::url::CanonicalUrl;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Crawl request not found: {0}")]
    CrawlRequestNotFound(Uuid),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence of crawl attempts
///
/// Implementations are the single source of truth for "has this URL been
/// crawled". They provide no locking of their own beyond per-call
/// transactions; concurrent callers may both see "not crawled".
pub trait CrawlRecordStore {
    /// Returns true if any crawl of this URL has produced a response
    fn is_crawled(&self, url: &CanonicalUrl) -> StorageResult<bool>;

    /// Records a crawl attempt with `got_response = false`
    ///
    /// The URL row is created if it does not exist yet.
    fn create_crawl_request(&mut self, crawl_uuid: Uuid, url: &CanonicalUrl)
        -> StorageResult<()>;

    /// Flips `got_response` to true for a recorded attempt
    fn mark_crawl_request_with_response(&mut self, crawl_uuid: Uuid) -> StorageResult<()>;

    /// Saves the response half of a crawl attempt
    fn add_crawl_response(
        &mut self,
        crawl_uuid: Uuid,
        body_uuid: Uuid,
        headers: &Headers,
        status_code: u16,
    ) -> StorageResult<()>;

    /// Marks the request and saves its response as one logical step
    ///
    /// Backends with transactions should override this so that no reader
    /// ever sees one half without the other.
    fn record_crawl_response(
        &mut self,
        crawl_uuid: Uuid,
        body_uuid: Uuid,
        headers: &Headers,
        status_code: u16,
    ) -> StorageResult<()> {
        self.mark_crawl_request_with_response(crawl_uuid)?;
        self.add_crawl_response(crawl_uuid, body_uuid, headers, status_code)
    }

    /// Every URL referenced by a bookmark that has no crawl response yet
    fn get_uncrawled_urls(&self) -> StorageResult<Vec<CanonicalUrl>>;

    /// Looks up a URL by its UUID
    fn get_url_by_uuid(&self, url_uuid: Uuid) -> StorageResult<Option<CanonicalUrl>>;

    /// Gets a crawl request by ID
    fn get_crawl_request(&self, crawl_uuid: Uuid) -> StorageResult<Option<CrawlRequestRecord>>;

    /// Gets a crawl response by the ID of its request
    fn get_crawl_response(&self, crawl_uuid: Uuid)
        -> StorageResult<Option<CrawlResponseRecord>>;

    /// Counts the responses recorded for a URL across all attempts
    fn count_crawl_responses(&self, url: &CanonicalUrl) -> StorageResult<u64>;

    /// Aggregate counts for reporting
    fn crawl_counts(&self) -> StorageResult<CrawlCounts>;
}

/// Persistence of bookmarks
pub trait BookmarkStore {
    /// Inserts the URL if it is not already present, returning its UUID
    fn upsert_url(&mut self, url: &CanonicalUrl) -> StorageResult<Uuid>;

    /// Gets the stored bookmark for a URL
    fn get_bookmark(&self, url: &CanonicalUrl) -> StorageResult<Option<Bookmark>>;

    /// Stores a bookmark, replacing any previous version and its tags
    fn set_bookmark(&mut self, bookmark: &Bookmark) -> StorageResult<()>;

    /// Gets every stored bookmark, tombstoned ones included
    fn all_bookmarks(&self) -> StorageResult<Vec<Bookmark>>;

    /// Gets total bookmark count
    fn count_bookmarks(&self) -> StorageResult<u64>;
}
