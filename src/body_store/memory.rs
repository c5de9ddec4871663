//! In-memory body store for tests and dry runs

use super::{check_name, gzip, BodyStore, BodyStoreError, BodyStoreResult};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Mutex;

type Objects = HashMap<(String, String), Vec<u8>>;

/// Keeps compressed bodies in a map keyed by `(bucket, key)`
///
/// Share it behind an `Arc` and call [`MemoryBodyStore::reset`] between
/// tests instead of building a new one.
#[derive(Debug, Default)]
pub struct MemoryBodyStore {
    objects: Mutex<Objects>,
}

impl MemoryBodyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every stored body
    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Keys stored in a bucket, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .lock()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-written
    fn lock(&self) -> std::sync::MutexGuard<'_, Objects> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BodyStore for MemoryBodyStore {
    fn upload(&self, bucket: &str, body: &mut dyn Read, key: &str) -> BodyStoreResult<()> {
        check_name(bucket)?;
        check_name(key)?;
        let compressed = gzip(body)?;
        self.lock()
            .insert((bucket.to_string(), key.to_string()), compressed);
        Ok(())
    }

    fn download_raw(&self, bucket: &str, key: &str) -> BodyStoreResult<Vec<u8>> {
        self.lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| BodyStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}
