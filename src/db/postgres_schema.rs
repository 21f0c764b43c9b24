pub const POSTGRES_SCHEMA: &str = r#"
-- PostgreSQL schema for Pixly

CREATE TABLE IF NOT EXISTS pictures (
    id BIGSERIAL PRIMARY KEY,
    image_url TEXT NOT NULL,
    file_name TEXT NOT NULL,

    date_time TEXT,
    camera_make TEXT,
    camera_model TEXT,
    iso BIGINT,
    flash BIGINT,
    pic_width BIGINT,
    pic_height BIGINT,
    shutter_speed DOUBLE PRECISION,
    aperture DOUBLE PRECISION,
    location TEXT,

    photographer TEXT NOT NULL,
    caption TEXT NOT NULL,
    uploaded_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_pictures_photographer ON pictures(photographer);
"#;
