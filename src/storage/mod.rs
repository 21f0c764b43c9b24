//! Object store client.
//!
//! Objects are opaque byte blobs addressed by the stringified picture id.
//! The store has no naming scheme of its own: the id in the metadata row is
//! the only link between a picture and its bytes.

pub mod fs;
#[cfg(test)]
pub mod memory;
pub mod s3;

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{StorageBackendType, StorageConfig};
use crate::db::PictureId;
use crate::error::PixlyError;

pub use fs::FsObjectStore;
#[cfg(test)]
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

/// Key of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn for_picture(id: PictureId) -> Self {
        ObjectKey(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Picture id encoded in this key, if it is one.
    pub fn picture_id(&self) -> Option<PictureId> {
        self.0.parse().ok()
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Visibility of a written object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Acl {
    #[default]
    Private,
    PublicRead,
}

impl Acl {
    /// Canned ACL name understood by S3-compatible gateways.
    pub fn canned(&self) -> &'static str {
        match self {
            Acl::Private => "private",
            Acl::PublicRead => "public-read",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("object `{0}` does not exist")]
    NotFound(ObjectKey),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Timeout(String),
}

impl From<StoreError> for PixlyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => match key.picture_id() {
                Some(id) => PixlyError::NotFound(id),
                None => PixlyError::BackendUnavailable(format!("object `{key}` does not exist")),
            },
            StoreError::Unavailable(reason) => PixlyError::BackendUnavailable(reason),
            StoreError::Timeout(reason) => PixlyError::Timeout(reason),
        }
    }
}

/// Blocking get/put of byte blobs by key.
pub trait ObjectStore: Send + Sync {
    /// Fetch the current bytes of an object.
    fn get(&self, key: &ObjectKey) -> Result<Vec<u8>, StoreError>;

    /// Create or overwrite an object.
    fn put(&self, key: &ObjectKey, bytes: &[u8], acl: Acl) -> Result<(), StoreError>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Build the configured store. The handle is passed explicitly to whoever
/// needs it; there is no process-wide client.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.backend {
        StorageBackendType::Filesystem => Arc::new(
            FsObjectStore::open(&config.root)
                .with_context(|| format!("Failed to open object store at {}", config.root.display()))?,
        ),
        StorageBackendType::S3 => Arc::new(
            S3ObjectStore::new(config)
                .with_context(|| format!("Failed to configure S3 bucket `{}`", config.bucket))?,
        ),
    };
    tracing::info!(backend = store.backend_name(), "Object store ready");
    Ok(store)
}
