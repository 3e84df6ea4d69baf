//! Per-repository mutual exclusion.
//!
//! Two overlapping runs against the same destination repository would both
//! rebuild the identity map before either writes, and both would create the
//! same items. Every run holds the repository's lock for its whole duration.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::types::RepoRef;

/// Held for the duration of one repository run.
pub type RepoGuard = OwnedMutexGuard<()>;

/// Registry of async locks keyed by destination `owner/name`.
#[derive(Debug, Clone, Default)]
pub struct RepoLocks {
    locks: Arc<parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl RepoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, repo: &RepoRef) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(repo.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait until no other run holds `repo`.
    pub async fn acquire(&self, repo: &RepoRef) -> RepoGuard {
        self.lock_for(repo).lock_owned().await
    }

    /// Take the lock only if `repo` is idle.
    pub fn try_acquire(&self, repo: &RepoRef) -> Option<RepoGuard> {
        self.lock_for(repo).try_lock_owned().ok()
    }
}
