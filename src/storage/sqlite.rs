//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the
//! [`CrawlRecordStore`] and [`BookmarkStore`] traits. UUIDs and timestamps
//! are stored as text (RFC 3339 for timestamps).

use crate::bookmark::{Bookmark, TagTriple, TagTriples};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{BookmarkStore, CrawlRecordStore, StorageError, StorageResult};
use crate::storage::{CrawlCounts, CrawlRequestRecord, CrawlResponseRecord, Headers};
use crate::url::CanonicalUrl;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

const URL_COLUMNS: &str = "u.url_uuid, u.scheme, u.netloc, u.path, u.query, u.fragment";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for tests and dry runs)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn ts_to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn ts_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn uuid_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads the six url columns starting at `offset`
fn url_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<CanonicalUrl> {
    Ok(CanonicalUrl::from_parts(
        uuid_from_row(row, offset)?,
        row.get::<_, String>(offset + 1)?,
        row.get::<_, String>(offset + 2)?,
        row.get::<_, String>(offset + 3)?,
        row.get::<_, String>(offset + 4)?,
        row.get::<_, String>(offset + 5)?,
    ))
}

fn insert_url(conn: &Connection, url: &CanonicalUrl) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO urls (url_uuid, scheme, netloc, path, query, fragment)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            url.url_uuid.to_string(),
            url.scheme,
            url.netloc,
            url.path,
            url.query,
            url.fragment
        ],
    )?;
    Ok(())
}

fn mark_response(conn: &Connection, crawl_uuid: Uuid) -> StorageResult<()> {
    let updated = conn.execute(
        "UPDATE crawl_requests SET got_response = 1 WHERE crawl_uuid = ?1",
        params![crawl_uuid.to_string()],
    )?;
    if updated == 0 {
        return Err(StorageError::CrawlRequestNotFound(crawl_uuid));
    }
    Ok(())
}

fn insert_response(
    conn: &Connection,
    crawl_uuid: Uuid,
    body_uuid: Uuid,
    headers: &Headers,
    status_code: u16,
) -> StorageResult<()> {
    let headers_json =
        serde_json::to_string(headers).map_err(|e| StorageError::Serialization(e.to_string()))?;
    conn.execute(
        "INSERT INTO crawl_responses (crawl_uuid, body_uuid, headers, status_code)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            crawl_uuid.to_string(),
            body_uuid.to_string(),
            headers_json,
            status_code
        ],
    )?;
    Ok(())
}

impl SqliteStorage {
    fn load_tags(&self, url_uuid: Uuid) -> StorageResult<TagTriples> {
        let mut stmt = self
            .conn
            .prepare("SELECT tag_name, updated, deleted FROM bookmark_tags WHERE url_uuid = ?1")?;

        let tags = stmt
            .query_map(params![url_uuid.to_string()], |row| {
                Ok(TagTriple::new(
                    row.get::<_, String>(0)?,
                    ts_from_row(row, 1)?,
                    row.get(2)?,
                ))
            })?
            .collect::<Result<TagTriples, _>>()?;

        Ok(tags)
    }

    fn query_bookmarks(&self, filter: Option<Uuid>) -> StorageResult<Vec<Bookmark>> {
        let sql = format!(
            "SELECT {URL_COLUMNS}, b.title, b.description, b.created, b.updated, b.unread, b.deleted
             FROM bookmarks b JOIN urls u ON u.url_uuid = b.url_uuid
             WHERE (?1 IS NULL OR b.url_uuid = ?1)
             ORDER BY b.updated DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let rows = stmt
            .query_map(params![filter.map(|u| u.to_string())], |row| {
                Ok(Bookmark {
                    url: url_from_row(row, 0)?,
                    title: row.get(6)?,
                    description: row.get(7)?,
                    created: ts_from_row(row, 8)?,
                    updated: ts_from_row(row, 9)?,
                    unread: row.get(10)?,
                    deleted: row.get(11)?,
                    tag_triples: TagTriples::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|mut bookmark| {
                bookmark.tag_triples = self.load_tags(bookmark.url.url_uuid)?;
                Ok(bookmark)
            })
            .collect()
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl CrawlRecordStore for SqliteStorage {
    fn is_crawled(&self, url: &CanonicalUrl) -> StorageResult<bool> {
        let crawled: bool = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM crawl_requests r
                JOIN crawl_responses s ON s.crawl_uuid = r.crawl_uuid
                WHERE r.url_uuid = ?1
             )",
            params![url.url_uuid.to_string()],
            |row| row.get(0),
        )?;
        Ok(crawled)
    }

    fn create_crawl_request(
        &mut self,
        crawl_uuid: Uuid,
        url: &CanonicalUrl,
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        insert_url(&tx, url)?;
        tx.execute(
            "INSERT INTO crawl_requests (crawl_uuid, url_uuid, requested, got_response)
             VALUES (?1, ?2, ?3, 0)",
            params![
                crawl_uuid.to_string(),
                url.url_uuid.to_string(),
                ts_to_db(&Utc::now())
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn mark_crawl_request_with_response(&mut self, crawl_uuid: Uuid) -> StorageResult<()> {
        mark_response(&self.conn, crawl_uuid)
    }

    fn add_crawl_response(
        &mut self,
        crawl_uuid: Uuid,
        body_uuid: Uuid,
        headers: &Headers,
        status_code: u16,
    ) -> StorageResult<()> {
        insert_response(&self.conn, crawl_uuid, body_uuid, headers, status_code)
    }

    fn record_crawl_response(
        &mut self,
        crawl_uuid: Uuid,
        body_uuid: Uuid,
        headers: &Headers,
        status_code: u16,
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        mark_response(&tx, crawl_uuid)?;
        insert_response(&tx, crawl_uuid, body_uuid, headers, status_code)?;
        tx.commit()?;
        Ok(())
    }

    fn get_uncrawled_urls(&self) -> StorageResult<Vec<CanonicalUrl>> {
        let sql = format!(
            "SELECT {URL_COLUMNS}
             FROM urls u
             JOIN bookmarks b ON b.url_uuid = u.url_uuid
             WHERE NOT EXISTS (
                SELECT 1 FROM crawl_requests r
                JOIN crawl_responses s ON s.crawl_uuid = r.crawl_uuid
                WHERE r.url_uuid = u.url_uuid
             )
             ORDER BY u.scheme, u.netloc, u.path, u.query, u.fragment"
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let urls = stmt
            .query_map([], |row| url_from_row(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(urls)
    }

    fn get_url_by_uuid(&self, url_uuid: Uuid) -> StorageResult<Option<CanonicalUrl>> {
        let sql = format!("SELECT {URL_COLUMNS} FROM urls u WHERE u.url_uuid = ?1");
        let url = self
            .conn
            .query_row(&sql, params![url_uuid.to_string()], |row| {
                url_from_row(row, 0)
            })
            .optional()?;
        Ok(url)
    }

    fn get_crawl_request(&self, crawl_uuid: Uuid) -> StorageResult<Option<CrawlRequestRecord>> {
        let request = self
            .conn
            .query_row(
                "SELECT crawl_uuid, url_uuid, requested, got_response
                 FROM crawl_requests WHERE crawl_uuid = ?1",
                params![crawl_uuid.to_string()],
                |row| {
                    Ok(CrawlRequestRecord {
                        crawl_uuid: uuid_from_row(row, 0)?,
                        url_uuid: uuid_from_row(row, 1)?,
                        requested: ts_from_row(row, 2)?,
                        got_response: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(request)
    }

    fn get_crawl_response(
        &self,
        crawl_uuid: Uuid,
    ) -> StorageResult<Option<CrawlResponseRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT crawl_uuid, body_uuid, headers, status_code
                 FROM crawl_responses WHERE crawl_uuid = ?1",
                params![crawl_uuid.to_string()],
                |row| {
                    Ok((
                        uuid_from_row(row, 0)?,
                        uuid_from_row(row, 1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u16>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((crawl_uuid, body_uuid, headers_json, status_code)) = row else {
            return Ok(None);
        };

        let headers: Headers = serde_json::from_str(&headers_json)
            .map_err(|e| StorageError::Corrupt(format!("headers of {crawl_uuid}: {e}")))?;

        Ok(Some(CrawlResponseRecord {
            crawl_uuid,
            body_uuid,
            headers,
            status_code,
        }))
    }

    fn count_crawl_responses(&self, url: &CanonicalUrl) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM crawl_responses s
             JOIN crawl_requests r ON r.crawl_uuid = s.crawl_uuid
             WHERE r.url_uuid = ?1",
            params![url.url_uuid.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn crawl_counts(&self) -> StorageResult<CrawlCounts> {
        Ok(CrawlCounts {
            requests: self.count("SELECT COUNT(*) FROM crawl_requests")?,
            requests_without_response: self
                .count("SELECT COUNT(*) FROM crawl_requests WHERE got_response = 0")?,
            responses: self.count("SELECT COUNT(*) FROM crawl_responses")?,
            crawled_urls: self.count(
                "SELECT COUNT(DISTINCT r.url_uuid) FROM crawl_requests r
                 JOIN crawl_responses s ON s.crawl_uuid = r.crawl_uuid",
            )?,
        })
    }
}

impl BookmarkStore for SqliteStorage {
    fn upsert_url(&mut self, url: &CanonicalUrl) -> StorageResult<Uuid> {
        insert_url(&self.conn, url)?;
        Ok(url.url_uuid)
    }

    fn get_bookmark(&self, url: &CanonicalUrl) -> StorageResult<Option<Bookmark>> {
        Ok(self.query_bookmarks(Some(url.url_uuid))?.into_iter().next())
    }

    fn set_bookmark(&mut self, bookmark: &Bookmark) -> StorageResult<()> {
        let url_uuid = bookmark.url.url_uuid.to_string();
        let tx = self.conn.transaction()?;

        insert_url(&tx, &bookmark.url)?;
        tx.execute(
            "INSERT INTO bookmarks (url_uuid, title, description, created, updated, unread, deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(url_uuid) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                created = excluded.created,
                updated = excluded.updated,
                unread = excluded.unread,
                deleted = excluded.deleted",
            params![
                url_uuid,
                bookmark.title,
                bookmark.description,
                ts_to_db(&bookmark.created),
                ts_to_db(&bookmark.updated),
                bookmark.unread,
                bookmark.deleted
            ],
        )?;

        tx.execute(
            "DELETE FROM bookmark_tags WHERE url_uuid = ?1",
            params![url_uuid],
        )?;
        for tag in bookmark.tag_triples.iter() {
            tx.execute(
                "INSERT INTO bookmark_tags (url_uuid, tag_name, updated, deleted)
                 VALUES (?1, ?2, ?3, ?4)",
                params![url_uuid, tag.name, ts_to_db(&tag.updated), tag.deleted],
            )?;
        }

        tx.commit()?;
        tracing::debug!("Stored bookmark {}", bookmark.url);
        Ok(())
    }

    fn all_bookmarks(&self) -> StorageResult<Vec<Bookmark>> {
        self.query_bookmarks(None)
    }

    fn count_bookmarks(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM bookmarks")
    }
}
