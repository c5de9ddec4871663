//! Crawl coordinator - one URL, one recorded attempt
//!
//! Every call to [`CrawlCoordinator::crawl_url`] leaves exactly one crawl
//! request row behind, and at most one response row:
//!
//! ```text
//! create_crawl_request ──► GET ──┬─ network error ──► (got_response = false)
//!                                └─ any response ──► upload body
//!                                                    ──► record_crawl_response
//! ```
//!
//! [`CrawlCoordinator::ensure_url_is_crawled`] checks the store first and
//! skips URLs that already have a response. The check and the crawl are
//! not atomic: two workers racing on one URL may both fetch it, which
//! leaves two responses and is harmless.

use crate::body_store::BodyStore;
use crate::config::Config;
use crate::crawler::{
    build_http_client, fetch_url, lock_store, FetchResult, SharedStore, DEFAULT_MAX_BODY_BYTES,
};
use crate::storage::CrawlRecordStore;
use crate::url::CanonicalUrl;
use crate::Result;
use reqwest::Client;
use std::sync::Arc;
use uuid::Uuid;

/// Performs and records crawls of single URLs
pub struct CrawlCoordinator<S> {
    storage: SharedStore<S>,
    body_store: Arc<dyn BodyStore>,
    client: Client,
    bucket: String,
    max_body_bytes: u64,
}

impl<S> Clone for CrawlCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            body_store: Arc::clone(&self.body_store),
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

impl<S: CrawlRecordStore> CrawlCoordinator<S> {
    /// Creates a coordinator from already-built collaborators
    ///
    /// # Arguments
    ///
    /// * `storage` - Crawl record store, shared with other components
    /// * `body_store` - Where response bodies are uploaded
    /// * `client` - HTTP client used for every fetch
    /// * `bucket` - Body store bucket for this deployment
    ///
    /// Bodies are capped at [`DEFAULT_MAX_BODY_BYTES`]; see
    /// [`CrawlCoordinator::with_max_body_bytes`].
    pub fn new(
        storage: SharedStore<S>,
        body_store: Arc<dyn BodyStore>,
        client: Client,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            body_store,
            client,
            bucket: bucket.into(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Sets the largest body a crawl keeps; bigger responses are treated as
    /// network failures
    pub fn with_max_body_bytes(mut self, max_body_bytes: u64) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Creates a coordinator, building the HTTP client from configuration
    pub fn from_config(
        config: &Config,
        storage: SharedStore<S>,
        body_store: Arc<dyn BodyStore>,
    ) -> Result<Self> {
        let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;
        Ok(Self::new(
            storage,
            body_store,
            client,
            config.body_store.bucket.clone(),
        )
        .with_max_body_bytes(config.crawler.max_body_bytes))
    }

    pub fn storage(&self) -> &SharedStore<S> {
        &self.storage
    }

    /// Crawls the URL unless some earlier crawl of it got a response
    pub async fn ensure_url_is_crawled(&self, url: &CanonicalUrl) -> Result<()> {
        let crawled = {
            let storage = lock_store(&self.storage)?;
            storage.is_crawled(url)?
        };

        if crawled {
            tracing::info!("{} already crawled", url);
            return Ok(());
        }

        self.crawl_url(url).await?;
        Ok(())
    }

    /// Makes one crawl attempt and records it
    ///
    /// Network failures are logged and leave the attempt without a response;
    /// they are not errors. Store and body store failures are.
    ///
    /// # Returns
    ///
    /// The `crawl_uuid` of the recorded attempt
    pub async fn crawl_url(&self, url: &CanonicalUrl) -> Result<Uuid> {
        let crawl_uuid = Uuid::new_v4();

        {
            let mut storage = lock_store(&self.storage)?;
            storage.create_crawl_request(crawl_uuid, url)?;
        }

        let fetched = fetch_url(&self.client, &url.to_string(), self.max_body_bytes).await;
        let (status_code, headers, body) = match fetched {
            FetchResult::Response {
                status_code,
                headers,
                body,
            } => (status_code, headers, body),
            FetchResult::NetworkError { error } => {
                tracing::warn!("Unable to request {} ({}): {}", url, crawl_uuid, error);
                return Ok(crawl_uuid);
            }
        };

        let body_uuid = Uuid::new_v4();

        // Body first: a response row must never point at a missing blob
        self.body_store
            .upload(&self.bucket, &mut body.as_slice(), &body_uuid.to_string())?;

        {
            let mut storage = lock_store(&self.storage)?;
            storage.record_crawl_response(crawl_uuid, body_uuid, &headers, status_code)?;
        }

        tracing::info!(
            "Crawled {} ({}): status {}, {} bytes",
            url,
            crawl_uuid,
            status_code,
            body.len()
        );

        Ok(crawl_uuid)
    }
}
