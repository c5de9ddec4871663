//! Statistics over the bookmark and crawl tables
//!
//! This module provides functionality for extracting and displaying
//! store statistics for the `--stats` mode.

use crate::storage::{BookmarkStore, CrawlCounts, CrawlRecordStore};
use crate::Result;
use std::fmt;

/// Store statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    /// Bookmarks stored, tombstones included
    pub bookmarks: u64,

    /// Bookmarked URLs without any crawl response
    pub uncrawled_urls: u64,

    /// Crawl table counts
    pub crawl: CrawlCounts,

    /// Messages waiting on the worker topic, when the bus was consulted
    pub pending_messages: Option<u64>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(MarksyncError)` - Failed to query statistics
pub fn load_statistics<S>(storage: &S) -> Result<StoreStatistics>
where
    S: BookmarkStore + CrawlRecordStore,
{
    Ok(StoreStatistics {
        bookmarks: storage.count_bookmarks()?,
        uncrawled_urls: storage.get_uncrawled_urls()?.len() as u64,
        crawl: storage.crawl_counts()?,
        pending_messages: None,
    })
}

impl fmt::Display for StoreStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Marksync Statistics ===\n")?;

        writeln!(f, "Bookmarks:")?;
        writeln!(f, "  Stored: {}", self.bookmarks)?;
        writeln!(f, "  URLs never crawled: {}", self.uncrawled_urls)?;
        writeln!(f)?;

        writeln!(f, "Crawls:")?;
        writeln!(f, "  Attempts: {}", self.crawl.requests)?;
        writeln!(f, "  Responses: {}", self.crawl.responses)?;
        writeln!(
            f,
            "  Attempts without response: {}",
            self.crawl.requests_without_response
        )?;
        writeln!(f, "  URLs crawled: {}", self.crawl.crawled_urls)?;

        if let Some(pending) = self.pending_messages {
            writeln!(f)?;
            writeln!(f, "Bus:")?;
            writeln!(f, "  Pending messages: {}", pending)?;
        }

        let response_rate = if self.crawl.requests > 0 {
            (self.crawl.responses as f64 / self.crawl.requests as f64) * 100.0
        } else {
            0.0
        };
        writeln!(f)?;
        writeln!(
            f,
            "Response Rate: {:.1}% ({} / {} attempts got a response)",
            response_rate, self.crawl.responses, self.crawl.requests
        )
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &StoreStatistics) {
    print!("{}", stats);
}
