//! Per-picture mutual exclusion.
//!
//! Two edits of the same picture would otherwise race between fetch and
//! store, and the slower one would silently discard the other's result.
//! Edits of different pictures never wait on each other.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};

use crate::db::PictureId;

#[derive(Default)]
pub struct IdLocks {
    busy: Mutex<HashSet<PictureId>>,
    released: Condvar,
}

/// Held for the duration of one edit; releases the id on drop.
pub struct IdGuard<'a> {
    locks: &'a IdLocks,
    id: PictureId,
}

impl IdLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no other edit holds `id`.
    pub fn acquire(&self, id: PictureId) -> IdGuard<'_> {
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        while busy.contains(&id) {
            busy = self
                .released
                .wait(busy)
                .unwrap_or_else(PoisonError::into_inner);
        }
        busy.insert(id);
        IdGuard { locks: self, id }
    }

    pub fn is_held(&self, id: PictureId) -> bool {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }
}

impl Drop for IdGuard<'_> {
    fn drop(&mut self) {
        self.locks
            .busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
        self.locks.released.notify_all();
    }
}
