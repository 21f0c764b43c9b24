pub const SCHEMA: &str = r#"
-- Pictures: one row per uploaded image. The id doubles as the object key.
CREATE TABLE IF NOT EXISTS pictures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    image_url TEXT NOT NULL,
    file_name TEXT NOT NULL,

    -- EXIF data, captured once at upload
    date_time TEXT,
    camera_make TEXT,
    camera_model TEXT,
    iso INTEGER,
    flash INTEGER,
    pic_width INTEGER,
    pic_height INTEGER,
    shutter_speed REAL,
    aperture REAL,
    location TEXT,

    -- Supplied by the uploader
    photographer TEXT NOT NULL,
    caption TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pictures_photographer ON pictures(photographer);
"#;

/// Additive changes for databases created by earlier versions. Each statement
/// may fail harmlessly when already applied.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE pictures ADD COLUMN uploaded_at TEXT",
];
