mod schema;
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "postgres")]
pub mod postgres_schema;

use anyhow::Result;
use serde::Serialize;

pub use schema::{MIGRATIONS, SCHEMA};

use crate::config::{DatabaseConfig, DatabaseType};

/// Primary key of a picture; its decimal form is also the object-store key.
pub type PictureId = i64;

/// One uploaded image as stored in the `pictures` table.
///
/// The EXIF-derived columns are captured once at upload and are never
/// recomputed, so after a rotation `pic_width`/`pic_height` still describe
/// the original orientation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Picture {
    pub id: PictureId,
    pub image_url: String,
    pub file_name: String,
    pub date_time: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub iso: Option<i64>,
    pub flash: Option<i64>,
    pub pic_width: Option<i64>,
    pub pic_height: Option<i64>,
    pub shutter_speed: Option<f64>,
    pub aperture: Option<f64>,
    pub location: Option<String>,
    pub photographer: String,
    pub caption: String,
    pub uploaded_at: Option<String>,
}

impl Picture {
    /// Public address of the stored object.
    pub fn display_url(&self) -> String {
        format!("{}{}", self.image_url, self.id)
    }
}

/// Row contents before an id has been assigned.
#[derive(Debug, Clone, Default)]
pub struct NewPicture {
    pub image_url: String,
    pub file_name: String,
    pub date_time: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub iso: Option<i64>,
    pub flash: Option<i64>,
    pub pic_width: Option<i64>,
    pub pic_height: Option<i64>,
    pub shutter_speed: Option<f64>,
    pub aperture: Option<f64>,
    pub location: Option<String>,
    pub photographer: String,
    pub caption: String,
    pub uploaded_at: Option<String>,
}

impl NewPicture {
    fn with_id(self, id: PictureId) -> Picture {
        Picture {
            id,
            image_url: self.image_url,
            file_name: self.file_name,
            date_time: self.date_time,
            camera_make: self.camera_make,
            camera_model: self.camera_model,
            iso: self.iso,
            flash: self.flash,
            pic_width: self.pic_width,
            pic_height: self.pic_height,
            shutter_speed: self.shutter_speed,
            aperture: self.aperture,
            location: self.location,
            photographer: self.photographer,
            caption: self.caption,
            uploaded_at: self.uploaded_at,
        }
    }
}

/// `%term%` pattern for case-insensitive substring search.
///
/// Only ASCII is folded, matching SQLite's `lower()`; non-ASCII letters
/// must be searched in the case they were stored in.
fn search_pattern(term: &str) -> String {
    let escaped = term
        .to_ascii_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Macro to dispatch a method call to the active backend variant.
macro_rules! dispatch {
    // No arguments beyond self
    ($self:expr, $method:ident()) => {
        match &$self.inner {
            DatabaseInner::Sqlite(db) => db.$method(),
            #[cfg(feature = "postgres")]
            DatabaseInner::Postgres(db) => db.$method(),
        }
    };
    // With arguments
    ($self:expr, $method:ident($($arg:expr),+ $(,)?)) => {
        match &$self.inner {
            DatabaseInner::Sqlite(db) => db.$method($($arg),+),
            #[cfg(feature = "postgres")]
            DatabaseInner::Postgres(db) => db.$method($($arg),+),
        }
    };
}

enum DatabaseInner {
    Sqlite(sqlite::SqliteDb),
    #[cfg(feature = "postgres")]
    Postgres(postgres::PgDb),
}

/// Metadata store for picture rows.
pub struct Database {
    inner: DatabaseInner,
}

impl Database {
    /// Open a database connection based on the provided configuration.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        #[cfg(feature = "postgres")]
        {
            if config.backend == DatabaseType::Postgresql {
                let url = config.postgresql_url.as_deref()
                    .ok_or_else(|| anyhow::anyhow!("PostgreSQL URL not configured"))?;
                let pool_size = config.pool_size.unwrap_or(10);
                let pg = postgres::PgDb::open(url, pool_size)?;
                return Ok(Self { inner: DatabaseInner::Postgres(pg) });
            }
        }
        #[cfg(not(feature = "postgres"))]
        {
            if config.backend == DatabaseType::Postgresql {
                anyhow::bail!(
                    "PostgreSQL backend requested but pixly was built without the `postgres` feature"
                );
            }
        }

        let db = sqlite::SqliteDb::open(&config.sqlite_path)?;
        Ok(Self { inner: DatabaseInner::Sqlite(db) })
    }

    /// Private in-memory SQLite database, mostly for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let db = sqlite::SqliteDb::open_in_memory()?;
        Ok(Self { inner: DatabaseInner::Sqlite(db) })
    }

    pub fn initialize(&self) -> Result<()> {
        dispatch!(self, initialize())
    }

    // ========================================================================
    // Picture operations
    // ========================================================================

    pub fn create_picture(&self, picture: NewPicture) -> Result<Picture> {
        dispatch!(self, create_picture(picture))
    }

    pub fn get_picture(&self, id: PictureId) -> Result<Option<Picture>> {
        dispatch!(self, get_picture(id))
    }

    /// All pictures ordered by id, optionally filtered by a substring of the
    /// caption or the photographer (case-insensitive).
    pub fn list_pictures(&self, search: Option<&str>) -> Result<Vec<Picture>> {
        dispatch!(self, list_pictures(search))
    }

    pub fn delete_picture(&self, id: PictureId) -> Result<bool> {
        dispatch!(self, delete_picture(id))
    }

    pub fn count_pictures(&self) -> Result<i64> {
        dispatch!(self, count_pictures())
    }
}
