//! PostgreSQL backend implementation.

use anyhow::Result;
use postgres::NoTls;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;

use super::postgres_schema::POSTGRES_SCHEMA;
use super::{search_pattern, NewPicture, Picture, PictureId};

const PICTURE_COLUMNS: &str = r#"
    id, image_url, file_name,
    date_time, camera_make, camera_model, iso, flash,
    pic_width, pic_height, shutter_speed, aperture, location,
    photographer, caption, uploaded_at
"#;

pub struct PgDb {
    pool: Pool<PostgresConnectionManager<NoTls>>,
}

/// Helper to parse a postgres Row into a Picture.
fn row_to_picture(row: &postgres::Row) -> Picture {
    Picture {
        id: row.get(0),
        image_url: row.get(1),
        file_name: row.get(2),
        date_time: row.get(3),
        camera_make: row.get(4),
        camera_model: row.get(5),
        iso: row.get(6),
        flash: row.get(7),
        pic_width: row.get(8),
        pic_height: row.get(9),
        shutter_speed: row.get(10),
        aperture: row.get(11),
        location: row.get(12),
        photographer: row.get(13),
        caption: row.get(14),
        uploaded_at: row.get(15),
    }
}

impl PgDb {
    pub fn open(url: &str, pool_size: u32) -> Result<Self> {
        let manager = PostgresConnectionManager::new(url.parse()?, NoTls);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)?;
        Ok(Self { pool })
    }

    pub fn initialize(&self) -> Result<()> {
        let mut client = self.pool.get()?;
        client.batch_execute(POSTGRES_SCHEMA)?;
        Ok(())
    }

    pub fn create_picture(&self, picture: NewPicture) -> Result<Picture> {
        let mut client = self.pool.get()?;
        let row = client.query_one(
            r#"
            INSERT INTO pictures (
                image_url, file_name,
                date_time, camera_make, camera_model, iso, flash,
                pic_width, pic_height, shutter_speed, aperture, location,
                photographer, caption, uploaded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING id
            "#,
            &[
                &picture.image_url,
                &picture.file_name,
                &picture.date_time,
                &picture.camera_make,
                &picture.camera_model,
                &picture.iso,
                &picture.flash,
                &picture.pic_width,
                &picture.pic_height,
                &picture.shutter_speed,
                &picture.aperture,
                &picture.location,
                &picture.photographer,
                &picture.caption,
                &picture.uploaded_at,
            ],
        )?;
        Ok(picture.with_id(row.get(0)))
    }

    pub fn get_picture(&self, id: PictureId) -> Result<Option<Picture>> {
        let mut client = self.pool.get()?;
        let sql = format!("SELECT {PICTURE_COLUMNS} FROM pictures WHERE id = $1");
        let row = client.query_opt(&sql, &[&id])?;
        Ok(row.as_ref().map(row_to_picture))
    }

    pub fn list_pictures(&self, search: Option<&str>) -> Result<Vec<Picture>> {
        let mut client = self.pool.get()?;
        let rows = match search {
            Some(term) => {
                let sql = format!(
                    r#"
                    SELECT {PICTURE_COLUMNS} FROM pictures
                    WHERE caption ILIKE $1 OR photographer ILIKE $1
                    ORDER BY id
                    "#
                );
                client.query(&sql, &[&search_pattern(term)])?
            }
            None => {
                let sql = format!("SELECT {PICTURE_COLUMNS} FROM pictures ORDER BY id");
                client.query(&sql, &[])?
            }
        };
        Ok(rows.iter().map(row_to_picture).collect())
    }

    pub fn delete_picture(&self, id: PictureId) -> Result<bool> {
        let mut client = self.pool.get()?;
        let deleted = client.execute("DELETE FROM pictures WHERE id = $1", &[&id])?;
        Ok(deleted > 0)
    }

    pub fn count_pictures(&self) -> Result<i64> {
        let mut client = self.pool.get()?;
        let row = client.query_one("SELECT COUNT(*) FROM pictures", &[])?;
        Ok(row.get(0))
    }
}
