// Workspace info lookup: runtime cache first, on-disk cache second.
//
// The on-disk cache is a TOML file listing known workspaces. Owner `.` is
// the authenticated user: it bypasses the runtime cache and matches by
// name alone when exactly one cached workspace carries that name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tfvc_common::types::{WorkingFolder, Workspace, WorkspaceLocation};

/// Owner placeholder meaning "whoever is authenticated".
pub const AUTHENTICATED_USER: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceKey {
    name: String,
    owner: String,
}

impl WorkspaceKey {
    pub fn new(name: &str, owner: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            owner: owner.to_lowercase(),
        }
    }

    pub fn of(workspace: &Workspace) -> Self {
        Self::new(&workspace.name, &workspace.owner)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    workspaces: Vec<Workspace>,
}

#[derive(Debug)]
pub struct WorkspaceRegistry {
    computer_name: String,
    runtime: RwLock<HashMap<WorkspaceKey, Workspace>>,
    cache_file: Option<PathBuf>,
}

impl WorkspaceRegistry {
    pub fn new(computer_name: impl Into<String>) -> Self {
        Self {
            computer_name: computer_name.into(),
            runtime: RwLock::new(HashMap::new()),
            cache_file: None,
        }
    }

    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = Some(path.into());
        self
    }

    pub fn computer_name(&self) -> &str {
        &self.computer_name
    }

    pub fn register(&self, workspace: Workspace) {
        let key = WorkspaceKey::of(&workspace);
        match self.runtime.write() {
            Ok(mut map) => map.insert(key, workspace),
            Err(poisoned) => poisoned.into_inner().insert(key, workspace),
        };
    }

    pub fn remove(&self, name: &str, owner: &str) -> Option<Workspace> {
        let key = WorkspaceKey::new(name, owner);
        match self.runtime.write() {
            Ok(mut map) => map.remove(&key),
            Err(poisoned) => poisoned.into_inner().remove(&key),
        }
    }

    /// Look a workspace up by name and owner; empty names never resolve.
    pub fn get(&self, name: &str, owner: &str) -> Option<Workspace> {
        if name.is_empty() || owner.is_empty() {
            return None;
        }

        if owner != AUTHENTICATED_USER {
            let key = WorkspaceKey::new(name, owner);
            let hit = match self.runtime.read() {
                Ok(map) => map.get(&key).cloned(),
                Err(poisoned) => poisoned.into_inner().get(&key).cloned(),
            };
            if hit.is_some() {
                return hit;
            }
        }

        let found = self.lookup_on_disk(name, owner)?;
        debug!(workspace = %found.name, "workspace resolved from on-disk cache");
        self.register(found.clone());
        Some(found)
    }

    /// A SERVER-location workspace that lives on this machine.
    pub fn server_workspace(&self, name: &str, owner: &str) -> Option<Workspace> {
        self.get(name, owner).filter(|ws| {
            ws.location == WorkspaceLocation::Server && ws.is_on_computer(&self.computer_name)
        })
    }

    /// A LOCAL-location workspace that lives on this machine.
    pub fn local_workspace(&self, name: &str, owner: &str) -> Option<Workspace> {
        self.get(name, owner).filter(|ws| {
            ws.location == WorkspaceLocation::Local && ws.is_on_computer(&self.computer_name)
        })
    }

    /// Replace the cached mappings of a workspace.
    pub fn set_working_folders(&self, name: &str, owner: &str, folders: Vec<WorkingFolder>) {
        let key = WorkspaceKey::new(name, owner);
        let mut map = match self.runtime.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(ws) = map.get_mut(&key) {
            ws.folders = folders;
        }
    }

    /// Persist every runtime entry to the on-disk cache.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.cache_file else {
            return Ok(());
        };
        let mut workspaces: Vec<Workspace> = match self.runtime.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        };
        workspaces.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        write_cache_file(path, &CacheFile { workspaces })
    }

    fn lookup_on_disk(&self, name: &str, owner: &str) -> Option<Workspace> {
        let path = self.cache_file.as_deref()?;
        let cache = match read_cache_file(path) {
            Ok(cache) => cache,
            Err(error) => {
                debug!(path = %path.display(), error = %format!("{error:#}"), "workspace cache unreadable");
                return None;
            }
        };

        if owner == AUTHENTICATED_USER {
            let mut named = cache
                .workspaces
                .into_iter()
                .filter(|ws| ws.name.eq_ignore_ascii_case(name));
            let first = named.next()?;
            return named.next().is_none().then_some(first);
        }

        cache
            .workspaces
            .into_iter()
            .find(|ws| ws.matches(name, owner))
    }
}

fn read_cache_file(path: &Path) -> Result<CacheFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read workspace cache `{}`", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse workspace cache `{}`", path.display()))
}

fn write_cache_file(path: &Path, cache: &CacheFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create `{}`", parent.display()))?;
    }
    let contents = toml::to_string_pretty(cache).context("failed to serialize workspace cache")?;
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write workspace cache `{}`", path.display()))
}
