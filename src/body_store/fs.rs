//! Directory-backed body store

use super::{check_name, gzip, BodyStore, BodyStoreError, BodyStoreResult};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;

/// Stores each bucket as a sub-directory of `root` and each body as a file
/// named after its key
#[derive(Debug, Clone)]
pub struct FileBodyStore {
    root: PathBuf,
}

impl FileBodyStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> BodyStoreResult<PathBuf> {
        check_name(bucket)?;
        check_name(key)?;
        Ok(self.root.join(bucket).join(key))
    }
}

impl BodyStore for FileBodyStore {
    fn upload(&self, bucket: &str, body: &mut dyn Read, key: &str) -> BodyStoreResult<()> {
        let path = self.object_path(bucket, key)?;
        let compressed = gzip(body)?;

        fs::create_dir_all(self.root.join(bucket))?;
        // Keys are never reused, so an existing file is a caller bug
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.write_all(&compressed)?;
        file.sync_all()?;

        tracing::debug!("Uploaded {} bytes to {}/{}", compressed.len(), bucket, key);
        Ok(())
    }

    fn download_raw(&self, bucket: &str, key: &str) -> BodyStoreResult<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BodyStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => BodyStoreError::Io(e),
        })
    }
}
