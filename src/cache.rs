//! Process-wide response cache for display requests.
//!
//! Entries are keyed by request path plus query string. Only edits and
//! uploads invalidate; everything else reads through.

use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;
use crate::db::PictureId;

/// A rendered response body.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub content_type: &'static str,
    pub body: Arc<str>,
}

impl CachedResponse {
    pub fn json(body: String) -> Self {
        Self {
            content_type: "application/json",
            body: Arc::from(body),
        }
    }
}

/// Invalidation interface used by the edit pipeline.
pub trait CacheInvalidation: Send + Sync {
    /// Evict whatever was cached for one picture.
    fn invalidate(&self, id: PictureId);

    /// Evict everything.
    fn clear_all(&self);
}

pub struct ResponseCache {
    entries: Cache<String, CachedResponse>,
}

/// Cache key of the detail view of a picture.
pub fn detail_key(id: PictureId) -> String {
    format!("/images/{id}")
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        self.entries.get(key)
    }

    pub fn insert(&self, key: String, response: CachedResponse) {
        self.entries.insert(key, response);
    }

    /// Return the cached entry for `key`, rendering and storing it on a miss.
    pub fn get_or_render<E>(
        &self,
        key: &str,
        render: impl FnOnce() -> Result<CachedResponse, E>,
    ) -> Result<CachedResponse, E> {
        if let Some(hit) = self.get(key) {
            tracing::trace!(key, "Cache hit");
            return Ok(hit);
        }
        let response = render()?;
        self.insert(key.to_string(), response.clone());
        Ok(response)
    }
}

impl CacheInvalidation for ResponseCache {
    fn invalidate(&self, id: PictureId) {
        self.entries.invalidate(&detail_key(id));
    }

    fn clear_all(&self) {
        self.entries.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ResponseCache {
        ResponseCache::new(&CacheConfig::default())
    }

    #[test]
    fn test_read_through() {
        let cache = cache();
        let mut renders = 0;
        for _ in 0..3 {
            let response = cache
                .get_or_render::<()>("/images", || {
                    renders += 1;
                    Ok(CachedResponse::json("[]".to_string()))
                })
                .unwrap();
            assert_eq!(&*response.body, "[]");
        }
        assert_eq!(renders, 1);
    }

    #[test]
    fn test_render_error_is_not_cached() {
        let cache = cache();
        let result = cache.get_or_render("/images/1", || Err("db down"));
        assert_eq!(result, Err("db down"));
        assert!(cache.get("/images/1").is_none());
    }

    #[test]
    fn test_targeted_invalidation() {
        let cache = cache();
        cache.insert(detail_key(1), CachedResponse::json("one".into()));
        cache.insert(detail_key(2), CachedResponse::json("two".into()));
        cache.insert("/images".into(), CachedResponse::json("[]".into()));

        cache.invalidate(1);
        assert!(cache.get(&detail_key(1)).is_none());
        assert!(cache.get(&detail_key(2)).is_some());
        assert!(cache.get("/images").is_some());
    }

    #[test]
    fn test_clear_all() {
        let cache = cache();
        cache.insert(detail_key(1), CachedResponse::json("one".into()));
        cache.insert("/images?search=x".into(), CachedResponse::json("[]".into()));

        cache.clear_all();
        assert!(cache.get(&detail_key(1)).is_none());
        assert!(cache.get("/images?search=x").is_none());
    }
}
