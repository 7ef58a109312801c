// Per-workspace exclusive lock held across an online call and the resync
// that follows it.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};

use tracing::debug;

use tfvc_common::types::Workspace;

use crate::workspace::WorkspaceKey;

#[derive(Debug, Default)]
pub struct WorkspaceLocks {
    held: Mutex<HashSet<WorkspaceKey>>,
    released: Condvar,
}

/// Released on drop, on every exit path.
#[derive(Debug)]
pub struct WorkspaceLock<'a> {
    locks: &'a WorkspaceLocks,
    key: WorkspaceKey,
}

impl WorkspaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no other caller holds `workspace`, then take it.
    pub fn lock(&self, workspace: &Workspace) -> WorkspaceLock<'_> {
        let key = WorkspaceKey::of(workspace);
        let mut held = match self.held.lock() {
            Ok(held) => held,
            Err(poisoned) => poisoned.into_inner(),
        };
        while held.contains(&key) {
            debug!(workspace = %workspace.name, "waiting for workspace lock");
            held = match self.released.wait(held) {
                Ok(held) => held,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        held.insert(key.clone());
        WorkspaceLock { locks: self, key }
    }

    pub fn is_locked(&self, workspace: &Workspace) -> bool {
        let key = WorkspaceKey::of(workspace);
        match self.held.lock() {
            Ok(held) => held.contains(&key),
            Err(poisoned) => poisoned.into_inner().contains(&key),
        }
    }
}

impl Drop for WorkspaceLock<'_> {
    fn drop(&mut self) {
        match self.locks.held.lock() {
            Ok(mut held) => held.remove(&self.key),
            Err(poisoned) => poisoned.into_inner().remove(&self.key),
        };
        self.locks.released.notify_all();
    }
}
