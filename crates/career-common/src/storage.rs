/// Durable client-side blob storage.
///
/// A blob is an opaque byte payload addressed by a namespace (e.g. `career_cache`).
/// Like [`RedisCache`], every backend degrades gracefully: reads return `None` and writes
/// return `false` on failure, after logging a warning. Nothing here returns an error to the
/// caller.
///
/// Backends:
/// - [`FileBlobStore`]: one `{namespace}.json` file per blob under a root directory
/// - [`RedisBlobStore`]: one Redis key per blob, `career:v1:blob:{namespace}`
/// - [`MemoryBlobStore`]: process-local map, for ephemeral runs and tests
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::CommonError;
use crate::redis::RedisCache;

const REDIS_KEY_PREFIX: &str = "career:v1:blob:";

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the blob stored under `namespace`, if any.
    async fn read_blob(&self, namespace: &str) -> Option<Vec<u8>>;

    /// Replace the blob stored under `namespace`. Returns `true` if the write landed.
    async fn write_blob(&self, namespace: &str, bytes: &[u8]) -> bool;

    /// Remove the blob stored under `namespace`. Removing a missing blob succeeds.
    async fn remove_blob(&self, namespace: &str) -> bool;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

// --- Filesystem ---

pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, namespace: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_namespace(namespace)))
    }

    async fn write_atomic(&self, namespace: &str, bytes: &[u8]) -> Result<(), CommonError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.blob_path(namespace);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn read_blob(&self, namespace: &str) -> Option<Vec<u8>> {
        let path = self.blob_path(namespace);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no blob on disk");
                None
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "blob read failed");
                None
            }
        }
    }

    async fn write_blob(&self, namespace: &str, bytes: &[u8]) -> bool {
        self.write_atomic(namespace, bytes)
            .await
            .inspect_err(|e| warn!(error = %e, namespace, "blob write failed"))
            .is_ok()
    }

    async fn remove_blob(&self, namespace: &str) -> bool {
        match tokio::fs::remove_file(self.blob_path(namespace)).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(error = %e, namespace, "blob remove failed");
                false
            }
        }
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

/// Keep namespaces usable as file names: anything outside `[A-Za-z0-9_-]` becomes `_`.
fn sanitize_namespace(namespace: &str) -> String {
    namespace
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

// --- Redis ---

pub struct RedisBlobStore {
    redis: RedisCache,
}

impl RedisBlobStore {
    pub fn new(redis: RedisCache) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl BlobStore for RedisBlobStore {
    async fn read_blob(&self, namespace: &str) -> Option<Vec<u8>> {
        self.redis.get(&format!("{REDIS_KEY_PREFIX}{namespace}")).await
    }

    async fn write_blob(&self, namespace: &str, bytes: &[u8]) -> bool {
        self.redis
            .set(&format!("{REDIS_KEY_PREFIX}{namespace}"), bytes)
            .await
    }

    async fn remove_blob(&self, namespace: &str) -> bool {
        self.redis
            .delete(&format!("{REDIS_KEY_PREFIX}{namespace}"))
            .await
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

// --- In-memory ---

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read_blob(&self, namespace: &str) -> Option<Vec<u8>> {
        self.blobs().get(namespace).cloned()
    }

    async fn write_blob(&self, namespace: &str, bytes: &[u8]) -> bool {
        self.blobs().insert(namespace.to_string(), bytes.to_vec());
        true
    }

    async fn remove_blob(&self, namespace: &str) -> bool {
        self.blobs().remove(namespace);
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
