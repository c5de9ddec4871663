//! Bookmark sync
//!
//! A client sends every bookmark it has changed; each one is merged with the
//! stored version and the merged result is persisted. The client is sent
//! back every bookmark whose merged state differs from what it sent, so
//! after applying the response both sides hold the same value.

use crate::bookmark::Bookmark;
use crate::messaging::{Event, MessageBus};
use crate::storage::BookmarkStore;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Sync request and response body: `{"bookmarks": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub bookmarks: Vec<Bookmark>,
}

/// What a merge pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    /// Bookmarks the store had never seen, stored as received
    pub added: Vec<Bookmark>,
    /// Merged bookmarks that differ from the version the client sent
    pub changed: Vec<Bookmark>,
}

impl MergeResult {
    /// The payload to send back to the client
    pub fn response(&self) -> SyncPayload {
        SyncPayload {
            bookmarks: self.changed.clone(),
        }
    }
}

/// Bus and topic to announce newly added bookmarks on
pub struct Announce<'a> {
    pub bus: &'a dyn MessageBus,
    pub topic: &'a str,
}

/// Merges received bookmarks into the store
///
/// # Arguments
///
/// * `store` - Where bookmarks are read from and written to
/// * `received` - The client's versions
/// * `announce` - If given, a `BookmarkCreated` event is published for
///   every added bookmark
///
/// # Returns
///
/// * `Ok(MergeResult)` - Added and changed bookmarks
/// * `Err(MarksyncError)` - A store or bus call failed; bookmarks processed
///   before the failure stay persisted
pub fn merge_bookmarks<S: BookmarkStore + ?Sized>(
    store: &mut S,
    received: &[Bookmark],
    announce: Option<&Announce<'_>>,
) -> Result<MergeResult> {
    let mut result = MergeResult::default();

    for incoming in received {
        match store.get_bookmark(&incoming.url)? {
            None => {
                store.set_bookmark(incoming)?;
                if let Some(announce) = announce {
                    announce.bus.publish(
                        &Event::BookmarkCreated {
                            url_uuid: incoming.url.url_uuid,
                        },
                        announce.topic,
                    )?;
                }
                result.added.push(incoming.clone());
            }
            Some(stored) => {
                let merged = stored.merge(incoming);
                if merged != stored {
                    store.set_bookmark(&merged)?;
                }
                if &merged != incoming {
                    result.changed.push(merged);
                }
            }
        }
    }

    tracing::info!(
        "Merged {} bookmarks: {} added, {} changed",
        received.len(),
        result.added.len(),
        result.changed.len()
    );

    Ok(result)
}
