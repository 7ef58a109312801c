// Response shapes returned by the transport generations.
//
// Older generations return strictly less: the `Legacy*` shapes lack
// conflicts and change-pended flags, which the dispatcher fills with
// sentinels.

use tfvc_common::flags::ChangePendedFlags;
use tfvc_common::types::{
    CheckinResult, Conflict, Failure, GetOperation, PendingChange, PendingSet, Shelveset,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyCheckinResponse {
    pub result: CheckinResult,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinResponse {
    pub result: CheckinResult,
    pub conflicts: Vec<Failure>,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LegacyPendResponse {
    pub operations: Vec<GetOperation>,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendResponse {
    pub operations: Vec<GetOperation>,
    pub failures: Vec<Failure>,
    pub flags: ChangePendedFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LegacyMergeResponse {
    pub operations: Vec<GetOperation>,
    pub failures: Vec<Failure>,
    pub conflicts: Vec<Conflict>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeResponse {
    pub operations: Vec<GetOperation>,
    pub failures: Vec<Failure>,
    pub conflicts: Vec<Conflict>,
    pub flags: ChangePendedFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LegacyResolveResponse {
    pub operations: Vec<GetOperation>,
    pub undo_operations: Vec<GetOperation>,
    pub resolved_conflicts: Vec<Conflict>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolveResponse {
    pub operations: Vec<GetOperation>,
    pub undo_operations: Vec<GetOperation>,
    pub resolved_conflicts: Vec<Conflict>,
    pub flags: ChangePendedFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LegacyUnshelveResponse {
    pub shelveset: Option<Shelveset>,
    pub operations: Vec<GetOperation>,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnshelveResponse {
    pub shelveset: Option<Shelveset>,
    pub operations: Vec<GetOperation>,
    pub failures: Vec<Failure>,
    pub conflicts: Vec<Conflict>,
    pub flags: ChangePendedFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingChangesResponse {
    pub changes: Vec<PendingChange>,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingSetsResponse {
    pub sets: Vec<PendingSet>,
    pub failures: Vec<Failure>,
}
