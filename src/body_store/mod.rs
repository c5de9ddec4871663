//! Blob storage for crawled response bodies
//!
//! Bodies are written once under a freshly generated key and never
//! overwritten. Every backend stores the gzip form of the body; callers hand
//! over the canonical (decoded) bytes and get them back from [`BodyStore::download`].

mod fs;
mod memory;

pub use fs::FileBodyStore;
pub use memory::MemoryBodyStore;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Errors that can occur talking to a body store
#[derive(Debug, Error)]
pub enum BodyStoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No body stored at {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Invalid key or bucket name: {0:?}")]
    InvalidKey(String),
}

/// Result type for body store operations
pub type BodyStoreResult<T> = Result<T, BodyStoreError>;

/// A bucketed, append-only blob store
pub trait BodyStore: Send + Sync {
    /// Compresses everything `body` yields and stores it under `bucket/key`
    fn upload(&self, bucket: &str, body: &mut dyn Read, key: &str) -> BodyStoreResult<()>;

    /// Returns the stored bytes as written (gzip)
    fn download_raw(&self, bucket: &str, key: &str) -> BodyStoreResult<Vec<u8>>;

    /// Returns the decompressed body
    fn download(&self, bucket: &str, key: &str) -> BodyStoreResult<Vec<u8>> {
        let raw = self.download_raw(bucket, key)?;
        Ok(gunzip(&raw)?)
    }
}

/// Gzips a byte stream into memory
pub fn gzip(body: &mut dyn Read) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    io::copy(body, &mut encoder)?;
    encoder.flush()?;
    encoder.finish()
}

/// Decompresses a gzip buffer
pub fn gunzip(compressed: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(compressed);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Rejects names that could escape a bucket directory
pub(crate) fn check_name(name: &str) -> BodyStoreResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(BodyStoreError::InvalidKey(name.to_string()));
    }
    Ok(())
}
