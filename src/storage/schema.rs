//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Marksync database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Every URL ever bookmarked or crawled
CREATE TABLE IF NOT EXISTS urls (
    url_uuid TEXT PRIMARY KEY,
    scheme TEXT NOT NULL,
    netloc TEXT NOT NULL,
    path TEXT NOT NULL,
    query TEXT NOT NULL,
    fragment TEXT NOT NULL,
    UNIQUE(scheme, netloc, path, query, fragment)
);

CREATE INDEX IF NOT EXISTS idx_urls_netloc ON urls(netloc);

-- Merged bookmark state, one row per URL
CREATE TABLE IF NOT EXISTS bookmarks (
    url_uuid TEXT PRIMARY KEY REFERENCES urls(url_uuid),
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    created TEXT NOT NULL,
    updated TEXT NOT NULL,
    unread INTEGER NOT NULL,
    deleted INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bookmarks_updated ON bookmarks(updated);

-- Tag triples (tombstones included)
CREATE TABLE IF NOT EXISTS bookmark_tags (
    url_uuid TEXT NOT NULL REFERENCES bookmarks(url_uuid),
    tag_name TEXT NOT NULL,
    updated TEXT NOT NULL,
    deleted INTEGER NOT NULL,
    PRIMARY KEY(url_uuid, tag_name)
);

-- One row per crawl attempt, written before the fetch starts
CREATE TABLE IF NOT EXISTS crawl_requests (
    crawl_uuid TEXT PRIMARY KEY,
    url_uuid TEXT NOT NULL REFERENCES urls(url_uuid),
    requested TEXT NOT NULL,
    got_response INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_crawl_requests_url ON crawl_requests(url_uuid);

-- Only present for attempts that got a response
CREATE TABLE IF NOT EXISTS crawl_responses (
    crawl_uuid TEXT PRIMARY KEY REFERENCES crawl_requests(crawl_uuid),
    body_uuid TEXT NOT NULL UNIQUE,
    headers TEXT NOT NULL,
    status_code INTEGER NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
