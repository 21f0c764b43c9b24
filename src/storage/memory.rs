//! In-memory object store with failure injection, for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{Acl, ObjectKey, ObjectStore, StoreError};

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<ObjectKey, (Vec<u8>, Acl)>>,
    fail_get: Mutex<Option<StoreError>>,
    fail_put: Mutex<Option<StoreError>>,
    puts: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: ObjectKey, bytes: Vec<u8>) {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, (bytes, Acl::PublicRead));
    }

    pub fn snapshot(&self, key: &ObjectKey) -> Option<(Vec<u8>, Acl)> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Every following `get` fails with `err`.
    pub fn fail_gets_with(&self, err: StoreError) {
        *self.fail_get.lock().unwrap_or_else(PoisonError::into_inner) = Some(err);
    }

    /// Every following `put` fails with `err`.
    pub fn fail_puts_with(&self, err: StoreError) {
        *self.fail_put.lock().unwrap_or_else(PoisonError::into_inner) = Some(err);
    }

    /// Number of successful writes
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, key: &ObjectKey) -> Result<Vec<u8>, StoreError> {
        if let Some(err) = self.fail_get.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            return Err(err);
        }
        self.snapshot(key)
            .map(|(bytes, _)| bytes)
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    fn put(&self, key: &ObjectKey, bytes: &[u8], acl: Acl) -> Result<(), StoreError> {
        if let Some(err) = self.fail_put.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            return Err(err);
        }
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), (bytes.to_vec(), acl));
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
