use dashmap::DashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Process-wide registry of upload sessions currently being written.
///
/// At most one caller may hold a given session. Taking a held session fails right away
/// instead of waiting.
#[derive(Debug, Clone, Default)]
pub struct UploadLocks {
    held: Arc<DashSet<Uuid>>,
}

impl UploadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically mark `id` as held. Returns false if someone already holds it.
    pub fn try_acquire(&self, id: Uuid) -> bool {
        self.held.insert(id)
    }

    pub fn release(&self, id: Uuid) {
        self.held.remove(&id);
    }

    /// Take the lock for `id`, released when the guard drops.
    pub fn lock(&self, id: Uuid) -> Option<UploadLockGuard> {
        if self.try_acquire(id) {
            Some(UploadLockGuard {
                locks: self.clone(),
                id,
            })
        } else {
            None
        }
    }

    pub fn is_locked(&self, id: Uuid) -> bool {
        self.held.contains(&id)
    }
}

/// Holds a session lock until dropped, on every exit path.
#[derive(Debug)]
pub struct UploadLockGuard {
    locks: UploadLocks,
    id: Uuid,
}

impl UploadLockGuard {
    pub fn session_id(&self) -> Uuid {
        self.id
    }
}

impl Drop for UploadLockGuard {
    fn drop(&mut self) {
        self.locks.release(self.id);
    }
}
