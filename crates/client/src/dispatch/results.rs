// Version-independent results, one struct per operation family.

use tfvc_common::flags::ChangePendedFlags;
use tfvc_common::types::{
    CheckinResult, Conflict, Failure, GetOperation, PendingChange, PendingSet, Shelveset,
};
use tfvc_common::VcError;

use crate::transport::wire::{
    LegacyMergeResponse, LegacyPendResponse, LegacyResolveResponse, LegacyUnshelveResponse,
    MergeResponse, PendResponse, PendingChangesResponse, PendingSetsResponse, ResolveResponse,
    UnshelveResponse,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinOutcome {
    pub result: CheckinResult,
    /// Conflicts that blocked the check-in. Generations up to 2010 only
    /// report failures, which are surfaced here.
    pub conflicts: Vec<Failure>,
    pub failures: Vec<Failure>,
}

/// Result of pend and undo calls.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendOutcome {
    pub operations: Vec<GetOperation>,
    pub failures: Vec<Failure>,
    pub flags: ChangePendedFlags,
    /// False when the call was satisfied from local tables alone.
    pub online: bool,
}

impl PendOutcome {
    pub(crate) fn offline(operations: Vec<GetOperation>, failures: Vec<Failure>) -> Self {
        Self {
            operations,
            failures,
            flags: ChangePendedFlags::NONE,
            online: false,
        }
    }
}

impl From<PendResponse> for PendOutcome {
    fn from(r: PendResponse) -> Self {
        Self {
            operations: r.operations,
            failures: r.failures,
            flags: r.flags,
            online: true,
        }
    }
}

impl From<LegacyPendResponse> for PendOutcome {
    fn from(r: LegacyPendResponse) -> Self {
        Self {
            operations: r.operations,
            failures: r.failures,
            flags: ChangePendedFlags::UNKNOWN,
            online: true,
        }
    }
}

/// Result of merge and rollback.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    pub operations: Vec<GetOperation>,
    pub failures: Vec<Failure>,
    pub conflicts: Vec<Conflict>,
    pub flags: ChangePendedFlags,
}

impl From<MergeResponse> for MergeOutcome {
    fn from(r: MergeResponse) -> Self {
        Self {
            operations: r.operations,
            failures: r.failures,
            conflicts: r.conflicts,
            flags: r.flags,
        }
    }
}

impl From<LegacyMergeResponse> for MergeOutcome {
    fn from(r: LegacyMergeResponse) -> Self {
        Self {
            operations: r.operations,
            failures: r.failures,
            conflicts: r.conflicts,
            flags: ChangePendedFlags::UNKNOWN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnshelveOutcome {
    /// `None` when the shelveset was not found.
    pub shelveset: Option<Shelveset>,
    pub operations: Vec<GetOperation>,
    pub failures: Vec<Failure>,
    pub conflicts: Vec<Conflict>,
    pub flags: ChangePendedFlags,
}

impl From<UnshelveResponse> for UnshelveOutcome {
    fn from(r: UnshelveResponse) -> Self {
        Self {
            shelveset: r.shelveset,
            operations: r.operations,
            failures: r.failures,
            conflicts: r.conflicts,
            flags: r.flags,
        }
    }
}

impl From<LegacyUnshelveResponse> for UnshelveOutcome {
    fn from(r: LegacyUnshelveResponse) -> Self {
        Self {
            shelveset: r.shelveset,
            operations: r.operations,
            failures: r.failures,
            conflicts: Vec::new(),
            flags: ChangePendedFlags::UNKNOWN,
        }
    }
}

/// One conflict the server accepted a resolution for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConflict {
    pub conflict: Conflict,
    pub operations: Vec<GetOperation>,
    pub undo_operations: Vec<GetOperation>,
    /// Every conflict the resolution closed, including side effects.
    pub resolved_conflicts: Vec<Conflict>,
    pub flags: ChangePendedFlags,
}

impl ResolvedConflict {
    pub(crate) fn from_response(conflict: &Conflict, r: ResolveResponse) -> Self {
        Self {
            conflict: conflict.clone(),
            operations: r.operations,
            undo_operations: r.undo_operations,
            resolved_conflicts: r.resolved_conflicts,
            flags: r.flags,
        }
    }

    pub(crate) fn from_legacy(conflict: &Conflict, r: LegacyResolveResponse) -> Self {
        Self {
            conflict: conflict.clone(),
            operations: r.operations,
            undo_operations: r.undo_operations,
            resolved_conflicts: r.resolved_conflicts,
            flags: ChangePendedFlags::UNKNOWN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveErrorOptions {
    /// Stop at the first failed conflict and return its error.
    ThrowOnError,
    /// Hand each error to the handler and keep going.
    #[default]
    ReportToHandler,
}

/// Receives per-conflict results of a resolve batch as they happen, so
/// work done before a cancellation stays visible.
pub trait ResolveHandler {
    fn resolved(&mut self, resolution: ResolvedConflict);
    fn failed(&mut self, conflict: &Conflict, error: VcError);
}

#[derive(Debug, Default)]
pub struct CollectResolutions {
    pub resolved: Vec<ResolvedConflict>,
    pub failed: Vec<(Conflict, VcError)>,
}

impl ResolveHandler for CollectResolutions {
    fn resolved(&mut self, resolution: ResolvedConflict) {
        self.resolved.push(resolution);
    }

    fn failed(&mut self, conflict: &Conflict, error: VcError) {
        self.failed.push((conflict.clone(), error));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingChangesOutcome {
    pub changes: Vec<PendingChange>,
    pub failures: Vec<Failure>,
}

impl From<PendingChangesResponse> for PendingChangesOutcome {
    fn from(r: PendingChangesResponse) -> Self {
        Self {
            changes: r.changes,
            failures: r.failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingSetsOutcome {
    pub sets: Vec<PendingSet>,
    pub failures: Vec<Failure>,
}

impl From<PendingSetsResponse> for PendingSetsOutcome {
    fn from(r: PendingSetsResponse) -> Self {
        Self {
            sets: r.sets,
            failures: r.failures,
        }
    }
}
