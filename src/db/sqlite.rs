//! SQLite backend implementation.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::schema::{MIGRATIONS, SCHEMA};
use super::{search_pattern, NewPicture, Picture, PictureId};

const PICTURE_COLUMNS: &str = r#"
    id, image_url, file_name,
    date_time, camera_make, camera_model, iso, flash,
    pic_width, pic_height, shutter_speed, aperture, location,
    photographer, caption, uploaded_at
"#;

/// The connection is shared by concurrent request handlers.
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

fn row_to_picture(row: &Row<'_>) -> rusqlite::Result<Picture> {
    Ok(Picture {
        id: row.get(0)?,
        image_url: row.get(1)?,
        file_name: row.get(2)?,
        date_time: row.get(3)?,
        camera_make: row.get(4)?,
        camera_model: row.get(5)?,
        iso: row.get(6)?,
        flash: row.get(7)?,
        pic_width: row.get(8)?,
        pic_height: row.get(9)?,
        shutter_speed: row.get(10)?,
        aperture: row.get(11)?,
        location: row.get(12)?,
        photographer: row.get(13)?,
        caption: row.get(14)?,
        uploaded_at: row.get(15)?,
    })
}

impl SqliteDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        self.run_migrations()?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn();
        for migration in MIGRATIONS {
            let _ = conn.execute(migration, []);
        }
        Ok(())
    }

    // ========================================================================
    // Picture operations
    // ========================================================================

    pub fn create_picture(&self, picture: NewPicture) -> Result<Picture> {
        let conn = self.conn();
        conn.execute(
            r#"
            INSERT INTO pictures (
                image_url, file_name,
                date_time, camera_make, camera_model, iso, flash,
                pic_width, pic_height, shutter_speed, aperture, location,
                photographer, caption, uploaded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            rusqlite::params![
                picture.image_url,
                picture.file_name,
                picture.date_time,
                picture.camera_make,
                picture.camera_model,
                picture.iso,
                picture.flash,
                picture.pic_width,
                picture.pic_height,
                picture.shutter_speed,
                picture.aperture,
                picture.location,
                picture.photographer,
                picture.caption,
                picture.uploaded_at,
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(picture.with_id(id))
    }

    pub fn get_picture(&self, id: PictureId) -> Result<Option<Picture>> {
        let sql = format!("SELECT {PICTURE_COLUMNS} FROM pictures WHERE id = ?");
        let picture = self
            .conn()
            .query_row(&sql, [id], row_to_picture)
            .optional()?;
        Ok(picture)
    }

    pub fn list_pictures(&self, search: Option<&str>) -> Result<Vec<Picture>> {
        let conn = self.conn();
        let pictures = match search {
            Some(term) => {
                let sql = format!(
                    r#"
                    SELECT {PICTURE_COLUMNS} FROM pictures
                    WHERE lower(caption) LIKE ?1 ESCAPE '\'
                       OR lower(photographer) LIKE ?1 ESCAPE '\'
                    ORDER BY id
                    "#
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([search_pattern(term)], row_to_picture)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let sql = format!("SELECT {PICTURE_COLUMNS} FROM pictures ORDER BY id");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], row_to_picture)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(pictures)
    }

    pub fn delete_picture(&self, id: PictureId) -> Result<bool> {
        let deleted = self.conn().execute("DELETE FROM pictures WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }

    pub fn count_pictures(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM pictures", [], |row| row.get(0))?;
        Ok(count)
    }
}
