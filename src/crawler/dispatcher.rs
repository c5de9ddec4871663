//! Crawl dispatcher - fan-out of uncrawled URLs onto the bus

use crate::crawler::{lock_store, SharedStore};
use crate::messaging::{Event, MessageBus};
use crate::storage::CrawlRecordStore;
use crate::Result;
use std::sync::Arc;

/// Publishes one `CrawlRequested` message per bookmarked URL that has never
/// been crawled
///
/// Fire and forget: completion is not tracked, and running the dispatcher
/// again before the workers catch up publishes the same URLs again.
pub struct CrawlDispatcher<S> {
    storage: SharedStore<S>,
    bus: Arc<dyn MessageBus>,
    topic: String,
}

impl<S: CrawlRecordStore> CrawlDispatcher<S> {
    pub fn new(storage: SharedStore<S>, bus: Arc<dyn MessageBus>, topic: impl Into<String>) -> Self {
        Self {
            storage,
            bus,
            topic: topic.into(),
        }
    }

    /// Runs one dispatch pass
    ///
    /// # Returns
    ///
    /// The number of messages published
    pub fn request_crawls_for_uncrawled_urls(&self) -> Result<usize> {
        let urls = {
            let storage = lock_store(&self.storage)?;
            storage.get_uncrawled_urls()?
        };

        let mut published = 0;
        for url in &urls {
            self.bus.publish(
                &Event::CrawlRequested {
                    url_uuid: url.url_uuid,
                },
                &self.topic,
            )?;
            tracing::debug!("Requested crawl of {}", url);
            published += 1;
        }

        tracing::info!("Requested {} crawls on {}", published, self.topic);
        Ok(published)
    }
}
