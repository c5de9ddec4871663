//! Message bus contract and backends
//!
//! Work is handed between processes as small JSON events. The bus gives
//! at-least-once delivery: a received message that is not acked within the
//! lease becomes visible again, so consumers must tolerate duplicates.

mod memory;
mod sqlite;

pub use memory::MemoryBus;
pub use sqlite::SqliteBus;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur talking to the bus
#[derive(Debug, Error)]
pub enum BusError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Malformed message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Bus lock poisoned")]
    LockPoisoned,
}

/// Result type for bus operations
pub type BusResult<T> = Result<T, BusError>;

/// Event payloads, tagged by `event_type` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum Event {
    /// Ask a worker to make sure the URL has been crawled
    CrawlRequested { url_uuid: Uuid },
    /// A bookmark was stored for a URL for the first time
    BookmarkCreated { url_uuid: Uuid },
}

impl Event {
    /// The URL the event is about
    pub fn url_uuid(&self) -> Uuid {
        match self {
            Event::CrawlRequested { url_uuid } | Event::BookmarkCreated { url_uuid } => *url_uuid,
        }
    }
}

/// An event plus its envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub event_id: Uuid,
    pub created: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl Message {
    pub fn new(event: Event) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            created: Utc::now(),
            event,
        }
    }
}

/// A received message, to be acked once handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivery_id: i64,
    pub topic: String,
    /// How many times this message has been handed out, this one included
    pub attempt: u32,
    pub message: Message,
}

/// A topic-based queue with at-least-once delivery
pub trait MessageBus: Send + Sync {
    /// Wraps the event in a fresh envelope and enqueues it
    fn publish(&self, event: &Event, topic: &str) -> BusResult<Message>;

    /// Leases the oldest visible message on the topic, if any
    fn receive(&self, topic: &str) -> BusResult<Option<Delivery>>;

    /// Removes a delivered message for good
    fn ack(&self, delivery: &Delivery) -> BusResult<()>;

    /// Messages on the topic that have not been acked
    fn pending(&self, topic: &str) -> BusResult<u64>;
}
