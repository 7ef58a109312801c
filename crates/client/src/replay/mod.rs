// Queued-edit replay.
//
// Edits made while disconnected are journaled per workspace. Before a
// server call that could conflict with them, the journal is replayed as a
// single pend of EDIT requests. Replay is best effort: failures become
// non-fatal events and the replayed entries are dropped either way.
//
// Replaying pends edits, and pending edits triggers replay. A per-workspace
// in-progress set breaks that cycle for every thread at once.

pub mod journal;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use tfvc_common::types::{ChangeRequest, Workspace};
use tfvc_common::VcError;

use crate::config::workspace_dir;
use crate::dispatch::PendOutcome;
use crate::events::EventBus;
use crate::workspace::WorkspaceKey;

pub use journal::{QueuedEditJournal, QueuedEditSet};

/// The pend the replayer issues. Implemented by the dispatcher.
pub trait EditPender {
    fn pend_queued_edits(&self, workspace: &Workspace, paths: &[String]) -> Result<PendOutcome, VcError>;
}

/// What a playback attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayReport {
    /// Another caller is already replaying this workspace.
    AlreadyInProgress,
    /// No journal, or nothing left after exclusions.
    Nothing,
    /// The pend was issued for these paths.
    Replayed { paths: Vec<String>, succeeded: bool },
}

#[derive(Debug)]
pub struct QueuedEditReplayer {
    configuration_dir: PathBuf,
    in_progress: Mutex<HashSet<WorkspaceKey>>,
}

struct InProgressGuard<'a> {
    set: &'a Mutex<HashSet<WorkspaceKey>>,
    key: WorkspaceKey,
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        match self.set.lock() {
            Ok(mut set) => set.remove(&self.key),
            Err(poisoned) => poisoned.into_inner().remove(&self.key),
        };
    }
}

impl QueuedEditReplayer {
    pub fn new(configuration_dir: impl Into<PathBuf>) -> Self {
        Self {
            configuration_dir: configuration_dir.into(),
            in_progress: Mutex::new(HashSet::new()),
        }
    }

    pub fn journal_for(&self, workspace: &Workspace) -> QueuedEditJournal {
        QueuedEditJournal::in_workspace_dir(&workspace_dir(&self.configuration_dir, workspace))
    }

    pub fn is_in_progress(&self, workspace: &Workspace) -> bool {
        let key = WorkspaceKey::of(workspace);
        match self.in_progress.lock() {
            Ok(set) => set.contains(&key),
            Err(poisoned) => poisoned.into_inner().contains(&key),
        }
    }

    fn begin(&self, workspace: &Workspace) -> Option<InProgressGuard<'_>> {
        let key = WorkspaceKey::of(workspace);
        let inserted = match self.in_progress.lock() {
            Ok(mut set) => set.insert(key.clone()),
            Err(poisoned) => poisoned.into_inner().insert(key.clone()),
        };
        inserted.then_some(InProgressGuard {
            set: &self.in_progress,
            key,
        })
    }

    /// Replay the workspace's queued edits, skipping any item named in
    /// `excluded` (those are being pended by the caller right now).
    pub fn playback(
        &self,
        pender: &dyn EditPender,
        workspace: &Workspace,
        excluded: &[ChangeRequest],
        events: &EventBus,
    ) -> ReplayReport {
        let Some(_guard) = self.begin(workspace) else {
            debug!(workspace = %workspace.name, "queued edit replay already in progress");
            return ReplayReport::AlreadyInProgress;
        };

        let journal = self.journal_for(workspace);
        if !journal.exists() {
            return ReplayReport::Nothing;
        }

        let mut edits = match journal.load() {
            Ok(edits) => edits,
            Err(error) => {
                warn!(workspace = %workspace.name, error = %format!("{error:#}"), "failed to load queued edits");
                return ReplayReport::Nothing;
            }
        };
        for request in excluded {
            edits.remove(&request.item.item);
        }
        if edits.is_empty() {
            return ReplayReport::Nothing;
        }

        let paths: Vec<String> = edits.iter().map(str::to_string).collect();
        info!(workspace = %workspace.name, count = paths.len(), "replaying queued edits");

        let succeeded = match pender.pend_queued_edits(workspace, &paths) {
            Ok(outcome) => {
                events.report_failures(Some(&workspace.name), &outcome.failures);
                true
            }
            Err(error) => {
                events.non_fatal(Some(&workspace.name), &error);
                false
            }
        };

        if let Err(error) = journal.remove(paths.iter().map(String::as_str)) {
            events.non_fatal(Some(&workspace.name), &format!("{error:#}"));
        }

        ReplayReport::Replayed { paths, succeeded }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::events::{ClientEvent, RecordingListener};
    use tempfile::TempDir;
    use tfvc_common::types::WorkspaceLocation;
    use tfvc_common::TransportFault;

    struct RecordingPender {
        calls: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    impl RecordingPender {
        fn new(fail: bool) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    impl EditPender for RecordingPender {
        fn pend_queued_edits(&self, _ws: &Workspace, paths: &[String]) -> Result<PendOutcome, VcError> {
            self.calls.lock().unwrap().push(paths.to_vec());
            if self.fail {
                Err(TransportFault::new("server unavailable").into())
            } else {
                Ok(PendOutcome::default())
            }
        }
    }

    fn workspace() -> Workspace {
        let mut ws = Workspace::new("ws", "alice", "box", WorkspaceLocation::Server);
        ws.security_token = Some("token".into());
        ws
    }

    #[test]
    fn empty_journal_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let replayer = QueuedEditReplayer::new(tmp.path());
        let pender = RecordingPender::new(false);

        let report = replayer.playback(&pender, &workspace(), &[], &EventBus::new());

        assert_eq!(report, ReplayReport::Nothing);
        assert!(pender.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn excluded_items_are_not_replayed() {
        let tmp = TempDir::new().unwrap();
        let replayer = QueuedEditReplayer::new(tmp.path());
        let ws = workspace();
        replayer.journal_for(&ws).add(&["/a/b.txt", "/a/c.txt"]).unwrap();
        let pender = RecordingPender::new(false);

        let report = replayer.playback(
            &pender,
            &ws,
            &[ChangeRequest::edit("/A/B.txt")],
            &EventBus::new(),
        );

        assert_eq!(
            report,
            ReplayReport::Replayed {
                paths: vec!["/a/c.txt".into()],
                succeeded: true,
            }
        );
        assert_eq!(*pender.calls.lock().unwrap(), vec![vec!["/a/c.txt".to_string()]]);
        let left = replayer.journal_for(&ws).load().unwrap();
        assert!(left.contains("/a/b.txt"));
        assert!(!left.contains("/a/c.txt"));
    }

    #[test]
    fn fully_excluded_journal_issues_no_pend() {
        let tmp = TempDir::new().unwrap();
        let replayer = QueuedEditReplayer::new(tmp.path());
        let ws = workspace();
        replayer.journal_for(&ws).add(&["/a/b.txt"]).unwrap();
        let pender = RecordingPender::new(false);

        let report = replayer.playback(&pender, &ws, &[ChangeRequest::edit("/a/b.txt")], &EventBus::new());

        assert_eq!(report, ReplayReport::Nothing);
        assert!(pender.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn failures_are_non_fatal_and_still_clear_the_journal() {
        let tmp = TempDir::new().unwrap();
        let replayer = QueuedEditReplayer::new(tmp.path());
        let ws = workspace();
        replayer.journal_for(&ws).add(&["/a/b.txt"]).unwrap();
        let pender = RecordingPender::new(true);
        let events = EventBus::new();
        let recorder = Arc::new(RecordingListener::default());
        events.subscribe(recorder.clone());

        let report = replayer.playback(&pender, &ws, &[], &events);

        assert!(matches!(report, ReplayReport::Replayed { succeeded: false, .. }));
        assert!(!replayer.journal_for(&ws).exists());
        assert!(matches!(
            recorder.events().as_slice(),
            [ClientEvent::NonFatalError { .. }]
        ));
    }

    #[test]
    fn guard_blocks_reentry_and_is_released() {
        let tmp = TempDir::new().unwrap();
        let replayer = QueuedEditReplayer::new(tmp.path());
        let ws = workspace();
        {
            let _guard = replayer.begin(&ws).unwrap();
            assert!(replayer.is_in_progress(&ws));
            let report = replayer.playback(&RecordingPender::new(false), &ws, &[], &EventBus::new());
            assert_eq!(report, ReplayReport::AlreadyInProgress);
        }
        assert!(!replayer.is_in_progress(&ws));
    }
}
