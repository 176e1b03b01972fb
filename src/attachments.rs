//! Seam to the external blob store holding attachment bytes.
//!
//! The server only tracks attachment metadata; physical bytes live elsewhere
//! and are addressed by an opaque storage key.

use async_trait::async_trait;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Remove the stored bytes for a key. Failures are reported, not fatal:
    /// record deletion proceeds and the caller logs the orphaned blob.
    async fn delete(&self, storage_key: &str) -> anyhow::Result<()>;
}

/// Blob store that only logs. Used when no external store is wired up.
pub struct NoopBlobStore;

#[async_trait]
impl BlobStore for NoopBlobStore {
    async fn delete(&self, storage_key: &str) -> anyhow::Result<()> {
        tracing::debug!("no blob store configured, skipping delete of {}", storage_key);
        Ok(())
    }
}
