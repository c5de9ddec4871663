//! Crawler module for fetching and archiving bookmarked pages
//!
//! This module contains the crawl pipeline, including:
//! - HTTP fetching of a single URL
//! - Recording each attempt and its response (coordinator)
//! - Fan-out of uncrawled URLs onto the message bus (dispatcher)
//! - Consuming that work with bounded concurrency (worker)

mod coordinator;
mod dispatcher;
mod fetcher;
mod worker;

pub use coordinator::CrawlCoordinator;
pub use dispatcher::CrawlDispatcher;
pub use fetcher::{
    build_http_client, fetch_url, lowercase_headers, FetchResult, DEFAULT_MAX_BODY_BYTES,
};
pub use worker::{CrawlWorker, WorkerSummary};

use crate::MarksyncError;
use std::sync::{Arc, Mutex, MutexGuard};

/// A store shared between the coordinator, dispatcher and sync flow
///
/// Locks are only ever held for one store call and never across an await.
pub type SharedStore<S> = Arc<Mutex<S>>;

/// Wraps a store for sharing
pub fn shared<S>(store: S) -> SharedStore<S> {
    Arc::new(Mutex::new(store))
}

pub(crate) fn lock_store<S>(storage: &SharedStore<S>) -> Result<MutexGuard<'_, S>, MarksyncError> {
    storage.lock().map_err(|_| MarksyncError::LockPoisoned)
}
