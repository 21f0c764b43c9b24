//! Fetch → edit → store → invalidate, for one picture.
//!
//! The object store is only written after the engine produced a complete
//! result, so request errors (unknown operation, undecodable object) and
//! read-side backend failures leave the stored object as it was. The staged
//! copy is removed on every exit path.

use std::fs;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::{EditEngine, EditOperation, IdLocks};
use crate::cache::CacheInvalidation;
use crate::config::InvalidationScope;
use crate::db::{Database, PictureId};
use crate::error::{PixlyError, PixlyResult};
use crate::storage::{Acl, ObjectKey, ObjectStore};

/// Local copy of an object being edited; deleted when dropped.
struct StagedImage {
    file: NamedTempFile,
}

impl StagedImage {
    fn create(dir: &Path, id: PictureId, extension: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let file = tempfile::Builder::new()
            .prefix(&format!("{id}-"))
            .suffix(&format!(".{extension}"))
            .tempfile_in(dir)?;
        Ok(Self { file })
    }

    fn replace(&mut self, bytes: &[u8]) -> io::Result<()> {
        let file = self.file.as_file_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(bytes)?;
        file.flush()
    }

    fn contents(&self) -> io::Result<Vec<u8>> {
        fs::read(self.file.path())
    }

    fn release(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            warn!("Failed to remove staged file {:?}: {}", path, e);
        }
    }
}

pub struct EditOrchestrator {
    catalog: Arc<Database>,
    store: Arc<dyn ObjectStore>,
    cache: Arc<dyn CacheInvalidation>,
    engine: EditEngine,
    scope: InvalidationScope,
    staging_dir: PathBuf,
    locks: IdLocks,
}

impl EditOrchestrator {
    pub fn new(
        catalog: Arc<Database>,
        store: Arc<dyn ObjectStore>,
        cache: Arc<dyn CacheInvalidation>,
        engine: EditEngine,
        scope: InvalidationScope,
        staging_dir: PathBuf,
    ) -> Self {
        Self {
            catalog,
            store,
            cache,
            engine,
            scope,
            staging_dir,
            locks: IdLocks::new(),
        }
    }

    /// Apply `op` to the stored image of picture `id`, overwrite it in place
    /// and return the picture's display URL.
    ///
    /// Blocks on the metadata store, the object store and the pixel
    /// transform; call it from a blocking context.
    pub fn edit_and_publish(&self, id: PictureId, op: EditOperation) -> PixlyResult<String> {
        let picture = self
            .catalog
            .get_picture(id)
            .map_err(PixlyError::backend)?
            .ok_or(PixlyError::NotFound(id))?;

        let _guard = self.locks.acquire(id);
        let key = ObjectKey::for_picture(id);

        let original = self.store.get(&key).map_err(|e| {
            warn!(id, operation = %op, "Fetch failed: {}", e);
            PixlyError::from(e)
        })?;
        debug!(id, bytes = original.len(), "Fetched object");

        let mut staged = StagedImage::create(&self.staging_dir, id, self.engine.encoding().extension())?;
        staged.replace(&original)?;

        let edited = self.engine.apply(&staged.contents()?, op)?;
        staged.replace(&edited)?;

        self.store
            .put(&key, &staged.contents()?, Acl::PublicRead)
            .map_err(|e| {
                warn!(id, operation = %op, "Store failed: {}", e);
                PixlyError::from(e)
            })?;

        self.invalidate(id);
        staged.release();

        info!(id, operation = %op, bytes = edited.len(), "Published edit");
        Ok(picture.display_url())
    }

    fn invalidate(&self, id: PictureId) {
        match self.scope {
            InvalidationScope::ClearAll => self.cache.clear_all(),
            InvalidationScope::Targeted => self.cache.invalidate(id),
        }
    }
}
