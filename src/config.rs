//! Configuration file and deployment-variable overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub edit: EditConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024 // 50MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[default]
    Sqlite,
    Postgresql,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: DatabaseType,

    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,

    #[serde(default)]
    pub postgresql_url: Option<String>,

    #[serde(default)]
    pub pool_size: Option<u32>,
}

fn default_sqlite_path() -> PathBuf {
    data_dir().join("pixly.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseType::default(),
            sqlite_path: default_sqlite_path(),
            postgresql_url: None,
            pool_size: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendType {
    #[default]
    Filesystem,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendType,

    /// Root directory of the filesystem backend
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Endpoint of an S3-compatible service. Unset means AWS S3 itself,
    /// resolved from `region`; when set, requests use path-style addressing.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    /// Bound for every network call to the object store
    #[serde(default = "default_storage_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_storage_root() -> PathBuf {
    data_dir().join("objects")
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket() -> String {
    "pixly".to_string()
}

fn default_storage_timeout_secs() -> u64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendType::default(),
            root: default_storage_root(),
            endpoint: None,
            region: default_region(),
            bucket: default_bucket(),
            access_key_id: None,
            secret_key: None,
            timeout_secs: default_storage_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Prefix of every display URL; the picture id is appended verbatim
    #[serde(default = "default_image_url")]
    pub image_url: String,
}

fn default_image_url() -> String {
    "http://127.0.0.1:5000/objects/".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            image_url: default_image_url(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationScope {
    /// Drop every cached response after an edit
    #[default]
    ClearAll,
    /// Drop only the cached responses of the edited picture
    Targeted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_cache_max_entries")]
    pub max_entries: u64,

    #[serde(default)]
    pub invalidation: InvalidationScope,
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_max_entries() -> u64 {
    1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
            invalidation: InvalidationScope::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
    #[default]
    Png,
    Jpeg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditConfig {
    /// Directory for the scoped staging files of in-flight edits
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Canonical storage encoding of every edited object
    #[serde(default)]
    pub encoding: EncodingFormat,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("pixly")
}

fn default_jpeg_quality() -> u8 {
    90
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            encoding: EncodingFormat::default(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Prefer systemd-journald when it is reachable (Linux only)
    #[serde(default = "default_journald")]
    pub journald: bool,

    /// Daily-rolling log files are written here when set
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_journald() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            journald: default_journald(),
            directory: None,
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pixly")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            display: DisplayConfig::default(),
            cache: CacheConfig::default(),
            edit: EditConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, creating it with defaults when absent.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::read(&config_path)?
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            config
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path; the file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Deployment variables take precedence over the file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("ACCESS_KEY_ID") {
            self.storage.access_key_id = Some(key);
        }
        if let Some(secret) = var("SECRET_KEY") {
            self.storage.secret_key = Some(secret);
        }
        if let Some(bucket) = var("BUCKET") {
            self.storage.bucket = bucket;
        }
        if let Some(url) = var("IMAGE_URL") {
            self.display.image_url = url;
        }
        if let Some(bind) = var("PIXLY_BIND") {
            self.server.bind = bind;
        }
        if let Some(url) = var("DATABASE_URL") {
            if url.starts_with("postgres://") || url.starts_with("postgresql://") {
                self.database.backend = DatabaseType::Postgresql;
                self.database.postgresql_url = Some(url);
            } else {
                self.database.backend = DatabaseType::Sqlite;
                self.database.sqlite_path = PathBuf::from(url);
            }
        }
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PIXLY_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pixly")
            .join("config.toml")
    }
}
