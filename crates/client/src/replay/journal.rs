// Queued-edit journal: a slotted file table under the workspace directory.
//
// Slots:
//   <base>.tf1  authoritative copy
//   <base>.tf2  on deck (fully written, about to become slot one)
//   <base>.tf3  being written
//
// A save writes slot three, then rotates three → two → one. A crash
// between renames leaves slot two behind; opening promotes it when slot
// one is missing and discards it otherwise.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// File name (before the slot extension) under the workspace directory.
pub const JOURNAL_FILE_NAME: &str = "queuededits";

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct JournalContents {
    version: u32,
    edits: Vec<String>,
}

/// Case-insensitive ordered set of local paths. Keeps the spelling of the
/// first insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueuedEditSet {
    entries: BTreeMap<String, String>,
}

impl QueuedEditSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        let key = path.to_lowercase();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, path);
        true
    }

    pub fn remove(&mut self, path: &str) -> bool {
        self.entries.remove(&path.to_lowercase()).is_some()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(&path.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for QueuedEditSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

#[derive(Debug, Clone)]
pub struct QueuedEditJournal {
    base: PathBuf,
}

impl QueuedEditJournal {
    /// Journal rooted at `<workspace_dir>/queuededits`.
    pub fn in_workspace_dir(workspace_dir: &Path) -> Self {
        Self {
            base: workspace_dir.join(JOURNAL_FILE_NAME),
        }
    }

    fn slot(&self, n: u8) -> PathBuf {
        let mut name = self.base.as_os_str().to_owned();
        name.push(format!(".tf{n}"));
        PathBuf::from(name)
    }

    /// Whether either durable slot exists. Cheap probe before a full load.
    pub fn exists(&self) -> bool {
        self.slot(1).exists() || self.slot(2).exists()
    }

    fn recover(&self) -> Result<()> {
        let (one, two) = (self.slot(1), self.slot(2));
        if !two.exists() {
            return Ok(());
        }
        if one.exists() {
            fs::remove_file(&two)
                .with_context(|| format!("failed to discard stale slot `{}`", two.display()))
        } else {
            fs::rename(&two, &one)
                .with_context(|| format!("failed to promote slot `{}`", two.display()))
        }
    }

    /// Load every queued path. A missing journal is an empty set.
    pub fn load(&self) -> Result<QueuedEditSet> {
        self.recover()?;
        let path = self.slot(1);
        if !path.exists() {
            return Ok(QueuedEditSet::new());
        }
        let raw = fs::read(&path)
            .with_context(|| format!("failed to read queued edits `{}`", path.display()))?;
        let contents: JournalContents = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse queued edits `{}`", path.display()))?;
        Ok(contents.edits.into_iter().collect())
    }

    /// Queue `paths`, keeping entries already present.
    pub fn add<S: AsRef<str>>(&self, paths: &[S]) -> Result<QueuedEditSet> {
        let mut set = self.load()?;
        for path in paths {
            set.insert(path.as_ref());
        }
        self.save(&set)?;
        Ok(set)
    }

    /// Drop `paths` from the journal. Removing the last entry deletes it.
    pub fn remove<'a>(&self, paths: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let mut set = self.load()?;
        let before = set.len();
        for path in paths {
            set.remove(path);
        }
        if set.len() == before {
            return Ok(());
        }
        self.save(&set)
    }

    fn save(&self, set: &QueuedEditSet) -> Result<()> {
        if set.is_empty() {
            for n in [1, 2, 3] {
                let path = self.slot(n);
                if path.exists() {
                    fs::remove_file(&path)
                        .with_context(|| format!("failed to delete `{}`", path.display()))?;
                }
            }
            return Ok(());
        }

        if let Some(parent) = self.base.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create `{}`", parent.display()))?;
        }
        let contents = JournalContents {
            version: FORMAT_VERSION,
            edits: set.iter().map(str::to_string).collect(),
        };
        let raw = serde_json::to_vec_pretty(&contents).context("failed to encode queued edits")?;

        let (one, two, three) = (self.slot(1), self.slot(2), self.slot(3));
        fs::write(&three, raw)
            .with_context(|| format!("failed to write `{}`", three.display()))?;
        fs::rename(&three, &two)
            .with_context(|| format!("failed to rotate `{}`", three.display()))?;
        fs::rename(&two, &one)
            .with_context(|| format!("failed to rotate `{}`", two.display()))?;
        Ok(())
    }
}
