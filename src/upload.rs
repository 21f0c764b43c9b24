//! Picture creation.
//!
//! A picture is created exactly once, together with its object: the row is
//! inserted first to obtain the id, then the original bytes are written at
//! that key. A failed write removes the row again.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::CacheInvalidation;
use crate::db::{Database, NewPicture, Picture};
use crate::error::{PixlyError, PixlyResult};
use crate::metadata;
use crate::storage::{Acl, ObjectKey, ObjectStore};

/// Form data of one upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub photographer: String,
    pub caption: String,
    pub bytes: Vec<u8>,
}

pub struct Uploader {
    catalog: Arc<Database>,
    store: Arc<dyn ObjectStore>,
    cache: Arc<dyn CacheInvalidation>,
    image_url: String,
}

/// Reduce an uploaded file name to a safe basename.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

fn required(value: &str, field: &str) -> PixlyResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PixlyError::InvalidInput(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

impl Uploader {
    pub fn new(
        catalog: Arc<Database>,
        store: Arc<dyn ObjectStore>,
        cache: Arc<dyn CacheInvalidation>,
        image_url: String,
    ) -> Self {
        Self {
            catalog,
            store,
            cache,
            image_url,
        }
    }

    /// Validate, catalogue and store one image. Blocking.
    pub fn upload(&self, request: UploadRequest) -> PixlyResult<Picture> {
        let photographer = required(&request.photographer, "photographer")?;
        let caption = required(&request.caption, "caption")?;
        if request.bytes.is_empty() {
            return Err(PixlyError::InvalidInput("photo is required".to_string()));
        }

        let info = metadata::inspect(&request.bytes)?;
        let exif = info.exif;

        let new = NewPicture {
            image_url: self.image_url.clone(),
            file_name: sanitize_file_name(&request.file_name),
            date_time: exif.date_time,
            camera_make: exif.camera_make,
            camera_model: exif.camera_model,
            iso: exif.iso,
            flash: exif.flash,
            pic_width: exif.pic_width.or(Some(i64::from(info.width))),
            pic_height: exif.pic_height.or(Some(i64::from(info.height))),
            shutter_speed: exif.shutter_speed,
            aperture: exif.aperture,
            location: exif.location,
            photographer,
            caption,
            uploaded_at: Some(Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()),
        };

        let picture = self.catalog.create_picture(new).map_err(PixlyError::backend)?;
        let key = ObjectKey::for_picture(picture.id);

        if let Err(e) = self.store.put(&key, &request.bytes, Acl::PublicRead) {
            warn!(id = picture.id, "Upload failed, removing row: {}", e);
            if let Err(rollback) = self.catalog.delete_picture(picture.id) {
                warn!(id = picture.id, "Failed to remove orphaned row: {:#}", rollback);
            }
            return Err(e.into());
        }

        self.cache.clear_all();
        info!(
            id = picture.id,
            bytes = request.bytes.len(),
            format = ?info.format,
            "Uploaded picture"
        );
        Ok(picture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResponseCache;
    use crate::config::{CacheConfig, InvalidationScope};
    use crate::edit::{decode, EditEngine, EditOperation, EditOrchestrator};
    use crate::metadata::tests::{ascii, long, plain_jpeg, with_exif};
    use crate::storage::{MemoryObjectStore, StoreError};
    use exif::Tag;
    use image::GenericImageView;

    const BASE_URL: &str = "https://pixly-bucket.s3.amazonaws.com/";

    struct Harness {
        db: Arc<Database>,
        store: Arc<MemoryObjectStore>,
        cache: Arc<ResponseCache>,
        uploader: Uploader,
    }

    fn harness() -> Harness {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.initialize().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        let cache = Arc::new(ResponseCache::new(&CacheConfig::default()));
        let uploader = Uploader::new(db.clone(), store.clone(), cache.clone(), BASE_URL.to_string());
        Harness {
            db,
            store,
            cache,
            uploader,
        }
    }

    fn request(bytes: Vec<u8>) -> UploadRequest {
        UploadRequest {
            file_name: "IMG_0001.JPG".to_string(),
            photographer: "Ansel".to_string(),
            caption: "Yosemite".to_string(),
            bytes,
        }
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\photos\\my pic.jpg"), "my_pic.jpg");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn test_upload_stores_row_and_object() {
        let h = harness();
        let bytes = plain_jpeg(64, 48);

        let picture = h.uploader.upload(request(bytes.clone())).unwrap();
        assert_eq!(picture.display_url(), format!("{BASE_URL}{}", picture.id));
        assert_eq!(picture.file_name, "IMG_0001.JPG");
        assert_eq!((picture.pic_width, picture.pic_height), (Some(64), Some(48)));
        assert!(picture.date_time.is_none());

        let (stored, acl) = h.store.snapshot(&ObjectKey::for_picture(picture.id)).unwrap();
        assert_eq!(stored, bytes);
        assert_eq!(acl, Acl::PublicRead);
        assert_eq!(h.db.get_picture(picture.id).unwrap(), Some(picture));
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let h = harness();
        let mut req = request(plain_jpeg(8, 8));
        req.caption = "   ".to_string();
        assert!(matches!(h.uploader.upload(req), Err(PixlyError::InvalidInput(_))));

        let req = request(Vec::new());
        assert!(matches!(h.uploader.upload(req), Err(PixlyError::InvalidInput(_))));
        assert_eq!(h.db.count_pictures().unwrap(), 0);
    }

    #[test]
    fn test_corrupt_upload_creates_nothing() {
        let h = harness();
        let err = h.uploader.upload(request(b"not an image".to_vec())).unwrap_err();
        assert!(matches!(err, PixlyError::CorruptImage(_)));
        assert_eq!(h.db.count_pictures().unwrap(), 0);
        assert_eq!(h.store.put_count(), 0);
    }

    #[test]
    fn test_failed_write_rolls_back_row() {
        let h = harness();
        h.store.fail_puts_with(StoreError::Unavailable("NoSuchBucket".into()));

        let err = h.uploader.upload(request(plain_jpeg(8, 8))).unwrap_err();
        assert!(matches!(err, PixlyError::BackendUnavailable(_)));
        assert_eq!(h.db.count_pictures().unwrap(), 0);
    }

    #[test]
    fn test_upload_then_rotate_keeps_metadata_stale() {
        let h = harness();
        let jpeg = with_exif(
            &plain_jpeg(800, 600),
            &[
                ascii(Tag::DateTime, "2020:01:01 10:00:00"),
                long(Tag::PixelXDimension, 800),
                long(Tag::PixelYDimension, 600),
            ],
        );

        let picture = h.uploader.upload(request(jpeg)).unwrap();
        let row = h.db.get_picture(picture.id).unwrap().unwrap();
        assert_eq!(row.pic_width, Some(800));
        assert_eq!(row.pic_height, Some(600));
        assert_eq!(row.date_time.as_deref(), Some("2020:01:01 10:00:00"));

        let staging = tempfile::tempdir().unwrap();
        let orchestrator = EditOrchestrator::new(
            h.db.clone(),
            h.store.clone(),
            h.cache.clone(),
            EditEngine::default(),
            InvalidationScope::ClearAll,
            staging.path().to_path_buf(),
        );
        let url = orchestrator.edit_and_publish(picture.id, EditOperation::Left).unwrap();
        assert_eq!(url, format!("{BASE_URL}{}", picture.id));

        let (stored, _) = h.store.snapshot(&ObjectKey::for_picture(picture.id)).unwrap();
        assert_eq!(decode(&stored).unwrap().dimensions(), (600, 800));

        let row = h.db.get_picture(picture.id).unwrap().unwrap();
        assert_eq!(row.pic_width, Some(800));
        assert_eq!(row.pic_height, Some(600));
    }
}
