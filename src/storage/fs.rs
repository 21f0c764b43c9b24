//! Directory-backed object store.
//!
//! Each object is a file named after its key. A JSON sidecar next to it
//! records the ACL, size and SHA-256 digest of the last write.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{Acl, ObjectKey, ObjectStore, StoreError};

/// Sidecar written next to every object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub acl: Acl,
    pub size_bytes: u64,
    pub sha256: String,
    pub written_at: String,
}

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create object directory {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn object_path(&self, key: &ObjectKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    fn meta_path(&self, key: &ObjectKey) -> PathBuf {
        self.root.join(format!("{}.meta.json", key.as_str()))
    }

    /// Read the sidecar of an object.
    pub fn meta(&self, key: &ObjectKey) -> Result<ObjectMeta, StoreError> {
        let raw = fs::read(self.meta_path(key)).map_err(|e| io_error(key, e))?;
        serde_json::from_slice(&raw)
            .map_err(|e| StoreError::Unavailable(format!("corrupt sidecar for `{key}`: {e}")))
    }

    /// Write to a temporary file in the same directory, then rename over the
    /// target, so readers never observe a partial object.
    fn write_atomic(&self, target: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(target).map_err(|e| e.error)?;
        Ok(())
    }
}

fn io_error(key: &ObjectKey, err: io::Error) -> StoreError {
    match err.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(key.clone()),
        io::ErrorKind::TimedOut => StoreError::Timeout(format!("`{key}`: {err}")),
        _ => StoreError::Unavailable(format!("`{key}`: {err}")),
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, key: &ObjectKey) -> Result<Vec<u8>, StoreError> {
        fs::read(self.object_path(key)).map_err(|e| io_error(key, e))
    }

    fn put(&self, key: &ObjectKey, bytes: &[u8], acl: Acl) -> Result<(), StoreError> {
        let meta = ObjectMeta {
            acl,
            size_bytes: bytes.len() as u64,
            sha256: format!("{:x}", Sha256::digest(bytes)),
            written_at: Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        };
        let meta_json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| StoreError::Unavailable(format!("`{key}`: {e}")))?;

        self.write_atomic(&self.object_path(key), bytes)
            .map_err(|e| io_error(key, e))?;
        self.write_atomic(&self.meta_path(key), &meta_json)
            .map_err(|e| io_error(key, e))?;

        tracing::debug!(key = %key, bytes = bytes.len(), acl = acl.canned(), "Stored object");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
