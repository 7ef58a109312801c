// In-memory server used by unit tests. One value implements every
// generation, records each call as "<generation>.<method>" and answers
// from canned state.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use tfvc_common::flags::{
    ChangePendedFlags, CheckinFlags, GetItemsOptions, GetOptions, MergeFlags, PendChangesOptions,
    RollbackOptions, SupportedFeatures,
};
use tfvc_common::types::{
    ChangeRequest, Changeset, CheckinNotificationInfo, CheckinResult, Conflict, DeletedState,
    ExtendedItem, Failure, GetOperation, GetRequest, HistoryQuery, ItemSpec, ItemType,
    LocalVersion, LockLevel, NewConflict, PendingChange, PendingSet, PropertyValue,
    ReconcileResult, RepositoryProperties, Resolution, ServerItemLocalVersionUpdate, Shelveset,
    VersionSpec, Workspace,
};
use tfvc_common::TransportFault;

use super::wire::*;
use super::{
    ExtensionsTransport, LocationService, Repository4Transport, Repository5Transport,
    RepositoryTransport, Rows, TransportResult,
};

/// Arguments of one reconcile call.
#[derive(Debug, Clone)]
pub(crate) struct ReconcileCall {
    pub signature: Uuid,
    pub pending_changes: Vec<PendingChange>,
    pub local_version_updates: Vec<ServerItemLocalVersionUpdate>,
    pub clear_local_version_table: bool,
}

#[derive(Debug)]
pub(crate) struct MockState {
    pub features: SupportedFeatures,
    pub locations: HashSet<String>,
    pub faults: HashMap<String, TransportFault>,

    pub operations: Vec<GetOperation>,
    pub failures: Vec<Failure>,
    pub conflicts: Vec<Conflict>,
    pub flags: ChangePendedFlags,
    pub changeset: i32,

    pub get_rows: Rows<GetOperation>,
    pub items: Option<Rows<ExtendedItem>>,
    pub local_versions: Option<Rows<LocalVersion>>,
    pub pending_changes: Vec<PendingChange>,
    pub pending_sets: Vec<PendingSet>,
    pub signature: Uuid,
    pub workspace: Option<Workspace>,
    pub history: Vec<Changeset>,
    pub shelveset: Option<Shelveset>,
    pub reconcile: Option<ReconcileResult>,
    /// Conflicts closed as a side effect of resolving the keyed id.
    pub side_effects: HashMap<i32, Vec<Conflict>>,

    pub calls: Vec<String>,
    pub pended: Vec<Vec<ChangeRequest>>,
    pub pend_options: Vec<PendChangesOptions>,
    pub get_options: Vec<GetOptions>,
    pub item_options: Vec<GetItemsOptions>,
    pub max_paths: Vec<i32>,
    pub history_queries: Vec<HistoryQuery>,
    pub reconciles: Vec<ReconcileCall>,
    pub encodings: Vec<i32>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            features: SupportedFeatures::ALL,
            locations: HashSet::new(),
            faults: HashMap::new(),
            operations: Vec::new(),
            failures: Vec::new(),
            conflicts: Vec::new(),
            flags: ChangePendedFlags::NONE,
            changeset: 1,
            get_rows: Vec::new(),
            items: Some(Vec::new()),
            local_versions: Some(Vec::new()),
            pending_changes: Vec::new(),
            pending_sets: Vec::new(),
            signature: Uuid::nil(),
            workspace: None,
            history: Vec::new(),
            shelveset: None,
            reconcile: None,
            side_effects: HashMap::new(),
            calls: Vec::new(),
            pended: Vec::new(),
            pend_options: Vec::new(),
            get_options: Vec::new(),
            item_options: Vec::new(),
            max_paths: Vec::new(),
            history_queries: Vec::new(),
            reconciles: Vec::new(),
            encodings: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockServer {
    state: Mutex<MockState>,
}

impl MockServer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub(crate) fn fail(&self, call: &str, fault: TransportFault) {
        self.state().faults.insert(call.to_string(), fault);
    }

    fn record(&self, call: &str) -> TransportResult<MutexGuard<'_, MockState>> {
        let mut state = self.state();
        state.calls.push(call.to_string());
        if let Some(fault) = state.faults.get(call).cloned() {
            return Err(fault);
        }
        Ok(state)
    }

    fn record_max_path(&self, call: &str, max_path: i32) -> TransportResult<MutexGuard<'_, MockState>> {
        let mut state = self.record(call)?;
        state.max_paths.push(max_path);
        Ok(state)
    }

    fn pend(&self, call: &str, changes: &[ChangeRequest], options: PendChangesOptions) -> TransportResult<PendResponse> {
        let mut state = self.record(call)?;
        state.pended.push(changes.to_vec());
        state.pend_options.push(options);
        Ok(PendResponse {
            operations: state.operations.clone(),
            failures: state.failures.clone(),
            flags: state.flags,
        })
    }

    fn pend_result(&self, call: &str) -> TransportResult<PendResponse> {
        let state = self.record(call)?;
        Ok(PendResponse {
            operations: state.operations.clone(),
            failures: state.failures.clone(),
            flags: state.flags,
        })
    }

    fn legacy(r: PendResponse) -> LegacyPendResponse {
        LegacyPendResponse {
            operations: r.operations,
            failures: r.failures,
        }
    }

    fn merge_result(&self, call: &str) -> TransportResult<MergeResponse> {
        let state = self.record(call)?;
        Ok(MergeResponse {
            operations: state.operations.clone(),
            failures: state.failures.clone(),
            conflicts: state.conflicts.clone(),
            flags: state.flags,
        })
    }

    fn checkin_result(&self, call: &str) -> TransportResult<CheckinResponse> {
        let state = self.record(call)?;
        Ok(CheckinResponse {
            result: CheckinResult::committed(state.changeset),
            conflicts: Vec::new(),
            failures: state.failures.clone(),
        })
    }

    fn legacy_checkin(r: CheckinResponse) -> LegacyCheckinResponse {
        LegacyCheckinResponse {
            result: r.result,
            failures: r.failures,
        }
    }

    fn get_rows(&self, call: &str, options: GetOptions) -> TransportResult<Rows<GetOperation>> {
        let mut state = self.record(call)?;
        state.get_options.push(options);
        Ok(state.get_rows.clone())
    }

    fn resolve_result(&self, call: &str, conflict_id: i32, encoding: i32) -> TransportResult<ResolveResponse> {
        let mut state = self.record(call)?;
        state.encodings.push(encoding);
        Ok(ResolveResponse {
            operations: state.operations.clone(),
            undo_operations: Vec::new(),
            resolved_conflicts: state.side_effects.get(&conflict_id).cloned().unwrap_or_default(),
            flags: state.flags,
        })
    }

    fn unshelve_result(&self, call: &str) -> TransportResult<UnshelveResponse> {
        let state = self.record(call)?;
        Ok(UnshelveResponse {
            shelveset: state.shelveset.clone(),
            operations: state.operations.clone(),
            failures: state.failures.clone(),
            conflicts: state.conflicts.clone(),
            flags: state.flags,
        })
    }

    fn legacy_unshelve(r: UnshelveResponse) -> LegacyUnshelveResponse {
        LegacyUnshelveResponse {
            shelveset: r.shelveset,
            operations: r.operations,
            failures: r.failures,
        }
    }

    fn pending_sets(&self, call: &str) -> TransportResult<PendingSetsResponse> {
        let state = self.record(call)?;
        Ok(PendingSetsResponse {
            sets: state.pending_sets.clone(),
            failures: Vec::new(),
        })
    }

    fn pending_changes(&self, call: &str) -> TransportResult<PendingChangesResponse> {
        let state = self.record(call)?;
        Ok(PendingChangesResponse {
            changes: state.pending_changes.clone(),
            failures: Vec::new(),
        })
    }

    fn items(&self, call: &str, options: GetItemsOptions) -> TransportResult<Option<Rows<ExtendedItem>>> {
        let mut state = self.record(call)?;
        state.item_options.push(options);
        Ok(state.items.clone())
    }

    fn workspace(&self, call: &str) -> TransportResult<Option<Workspace>> {
        let state = self.record(call)?;
        Ok(state.workspace.clone())
    }

    fn reconcile(
        &self,
        call: &str,
        signature: Uuid,
        pending_changes: &[PendingChange],
        local_version_updates: &[ServerItemLocalVersionUpdate],
        clear_local_version_table: bool,
    ) -> TransportResult<ReconcileResult> {
        let mut state = self.record(call)?;
        state.reconciles.push(ReconcileCall {
            signature,
            pending_changes: pending_changes.to_vec(),
            local_version_updates: local_version_updates.to_vec(),
            clear_local_version_table,
        });
        Ok(state.reconcile.clone().unwrap_or(ReconcileResult {
            new_signature: state.signature,
            pending_changes_updated: false,
            new_pending_changes: Vec::new(),
            replay_local_versions_required: false,
            failures: Vec::new(),
        }))
    }
}

impl LocationService for MockServer {
    fn location_for(&self, interface: &str) -> Option<String> {
        self.state()
            .locations
            .contains(interface)
            .then(|| format!("https://tfs.example/{interface}"))
    }
}

impl RepositoryTransport for MockServer {
    fn get_repository_properties(&self) -> TransportResult<RepositoryProperties> {
        let state = self.record("repo.get_repository_properties")?;
        Ok(RepositoryProperties {
            supported_features: state.features,
            latest_changeset: state.history.iter().map(|c| c.id).max().unwrap_or(1),
        })
    }

    fn add_conflict(&self, _workspace: &str, _owner: &str, _conflict: &NewConflict) -> TransportResult<()> {
        self.record("repo.add_conflict").map(drop)
    }

    fn check_in(
        &self,
        _workspace: &str,
        _owner: &str,
        _server_items: &[String],
        _changeset: &Changeset,
        _info: &CheckinNotificationInfo,
        _flags: CheckinFlags,
    ) -> TransportResult<LegacyCheckinResponse> {
        self.checkin_result("repo.check_in").map(Self::legacy_checkin)
    }

    fn check_pending_changes(&self, _workspace: &str, _owner: &str, _server_items: &[String]) -> TransportResult<Vec<Failure>> {
        Ok(self.record("repo.check_pending_changes")?.failures.clone())
    }

    fn create_workspace(&self, workspace: &Workspace) -> TransportResult<Workspace> {
        self.record("repo.create_workspace")?;
        let mut created = workspace.clone();
        created
            .security_token
            .get_or_insert_with(|| format!("token-{}", workspace.name));
        Ok(created)
    }

    fn update_workspace(
        &self,
        _old_name: &str,
        _owner: &str,
        workspace: &Workspace,
        _features: SupportedFeatures,
    ) -> TransportResult<Workspace> {
        self.record("repo.update_workspace")?;
        Ok(workspace.clone())
    }

    fn get(
        &self,
        _workspace: &str,
        _owner: &str,
        _requests: &[GetRequest],
        _get_all: bool,
        _preview: bool,
        _max_results: i32,
        options: GetOptions,
    ) -> TransportResult<Rows<GetOperation>> {
        self.get_rows("repo.get", options)
    }

    fn merge(
        &self,
        _workspace: &str,
        _owner: &str,
        _source: &ItemSpec,
        _target: &str,
        _from: Option<&VersionSpec>,
        _to: Option<&VersionSpec>,
        _lock_level: LockLevel,
        _flags: MergeFlags,
    ) -> TransportResult<LegacyMergeResponse> {
        let r = self.merge_result("repo.merge")?;
        Ok(LegacyMergeResponse {
            operations: r.operations,
            failures: r.failures,
            conflicts: r.conflicts,
        })
    }

    fn pend_changes(
        &self,
        _workspace: &str,
        _owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        _features: SupportedFeatures,
    ) -> TransportResult<LegacyPendResponse> {
        self.pend("repo.pend_changes", changes, options).map(Self::legacy)
    }

    fn query_conflicts(&self, _workspace: &str, _owner: &str, _items: &[ItemSpec]) -> TransportResult<Vec<Conflict>> {
        Ok(self.record("repo.query_conflicts")?.conflicts.clone())
    }

    fn query_history(&self, query: &HistoryQuery) -> TransportResult<Vec<Changeset>> {
        let mut state = self.record("repo.query_history")?;
        state.history_queries.push(query.clone());
        let upper = match &query.version_to {
            Some(VersionSpec::Changeset { id }) => *id,
            _ => i32::MAX,
        };
        let lower = match &query.version_from {
            Some(VersionSpec::Changeset { id }) => *id,
            _ => 1,
        };
        let mut page: Vec<Changeset> = state
            .history
            .iter()
            .filter(|c| c.id >= lower && c.id <= upper)
            .cloned()
            .collect();
        page.sort_by(|a, b| b.id.cmp(&a.id));
        page.truncate(usize::try_from(query.max_count).unwrap_or(0));
        Ok(page)
    }

    fn query_items_extended(
        &self,
        _workspace: Option<&str>,
        _owner: Option<&str>,
        _items: &[ItemSpec],
        _deleted: DeletedState,
        _item_type: ItemType,
        options: GetItemsOptions,
    ) -> TransportResult<Option<Rows<ExtendedItem>>> {
        self.items("repo.query_items_extended", options)
    }

    fn query_local_versions(&self, _workspace: &str, _owner: &str, _items: &[ItemSpec]) -> TransportResult<Option<Rows<LocalVersion>>> {
        Ok(self.record("repo.query_local_versions")?.local_versions.clone())
    }

    fn query_pending_sets(
        &self,
        _local_workspace: Option<&str>,
        _local_owner: Option<&str>,
        _workspace: Option<&str>,
        _owner: Option<&str>,
        _items: &[ItemSpec],
        _download_urls: bool,
    ) -> TransportResult<PendingSetsResponse> {
        self.pending_sets("repo.query_pending_sets")
    }

    fn query_workspace(&self, _workspace: &str, _owner: &str) -> TransportResult<Option<Workspace>> {
        self.workspace("repo.query_workspace")
    }

    fn remove_local_conflict(&self, _workspace: &str, _owner: &str, _conflict_id: i32) -> TransportResult<()> {
        self.record("repo.remove_local_conflict").map(drop)
    }

    fn resolve(
        &self,
        _workspace: &str,
        _owner: &str,
        conflict_id: i32,
        _resolution: Resolution,
        _new_path: Option<&str>,
        encoding: i32,
        _lock_level: LockLevel,
    ) -> TransportResult<LegacyResolveResponse> {
        let r = self.resolve_result("repo.resolve", conflict_id, encoding)?;
        Ok(LegacyResolveResponse {
            operations: r.operations,
            undo_operations: r.undo_operations,
            resolved_conflicts: r.resolved_conflicts,
        })
    }

    fn shelve(
        &self,
        _workspace: &str,
        _owner: &str,
        _server_items: &[String],
        _shelveset: &Shelveset,
        _replace: bool,
    ) -> TransportResult<Vec<Failure>> {
        Ok(self.record("repo.shelve")?.failures.clone())
    }

    fn undo_pending_changes(&self, _workspace: &str, _owner: &str, _items: &[ItemSpec]) -> TransportResult<LegacyPendResponse> {
        self.pend_result("repo.undo_pending_changes").map(Self::legacy)
    }

    fn unshelve(
        &self,
        _shelveset_name: &str,
        _shelveset_owner: &str,
        _workspace: &str,
        _owner: &str,
        _items: &[ItemSpec],
    ) -> TransportResult<LegacyUnshelveResponse> {
        self.unshelve_result("repo.unshelve").map(Self::legacy_unshelve)
    }
}

impl ExtensionsTransport for MockServer {
    fn check_in(
        &self,
        _workspace: &str,
        _owner: &str,
        _server_items: &[String],
        _changeset: &Changeset,
        _info: &CheckinNotificationInfo,
        _flags: CheckinFlags,
        _defer: bool,
        _ticket: i32,
    ) -> TransportResult<LegacyCheckinResponse> {
        self.checkin_result("ext.check_in").map(Self::legacy_checkin)
    }

    fn check_in_shelveset(
        &self,
        _shelveset_name: &str,
        _shelveset_owner: &str,
        _changeset_owner: &str,
        _info: &CheckinNotificationInfo,
        _flags: CheckinFlags,
    ) -> TransportResult<LegacyCheckinResponse> {
        self.checkin_result("ext.check_in_shelveset").map(Self::legacy_checkin)
    }

    fn get(
        &self,
        _workspace: &str,
        _owner: &str,
        _requests: &[GetRequest],
        _max_results: i32,
        options: GetOptions,
        _attribute_filters: Option<&[String]>,
    ) -> TransportResult<Rows<GetOperation>> {
        self.get_rows("ext.get", options)
    }

    fn merge(
        &self,
        _workspace: &str,
        _owner: &str,
        _source: &ItemSpec,
        _target: &str,
        _from: Option<&VersionSpec>,
        _to: Option<&VersionSpec>,
        _lock_level: LockLevel,
        _flags: MergeFlags,
        _attribute_filters: Option<&[String]>,
    ) -> TransportResult<MergeResponse> {
        self.merge_result("ext.merge")
    }

    fn pend_changes(
        &self,
        _workspace: &str,
        _owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        _features: SupportedFeatures,
        _attribute_filters: Option<&[String]>,
    ) -> TransportResult<PendResponse> {
        self.pend("ext.pend_changes", changes, options)
    }

    fn query_pending_changes_for_workspace(
        &self,
        _workspace: &str,
        _owner: &str,
        _items: &[ItemSpec],
        _download_urls: bool,
        _page_size: i32,
        _last_change: Option<&str>,
        _include_merge_info: bool,
    ) -> TransportResult<PendingChangesResponse> {
        self.pending_changes("ext.query_pending_changes_for_workspace")
    }

    fn resolve(
        &self,
        _workspace: &str,
        _owner: &str,
        conflict_id: i32,
        _resolution: Resolution,
        _new_path: Option<&str>,
        encoding: i32,
        _lock_level: LockLevel,
        _attribute_filters: Option<&[String]>,
    ) -> TransportResult<ResolveResponse> {
        self.resolve_result("ext.resolve", conflict_id, encoding)
    }

    fn rollback(
        &self,
        _workspace: &str,
        _owner: &str,
        _items: &[ItemSpec],
        _item_version: Option<&VersionSpec>,
        _from: Option<&VersionSpec>,
        _to: Option<&VersionSpec>,
        _options: RollbackOptions,
        _lock_level: LockLevel,
        _attribute_filters: Option<&[String]>,
    ) -> TransportResult<MergeResponse> {
        self.merge_result("ext.rollback")
    }

    fn undo_pending_changes(
        &self,
        _workspace: &str,
        _owner: &str,
        _items: &[ItemSpec],
        _attribute_filters: Option<&[String]>,
    ) -> TransportResult<PendResponse> {
        self.pend_result("ext.undo_pending_changes")
    }

    fn unshelve(
        &self,
        _shelveset_name: &str,
        _shelveset_owner: &str,
        _workspace: &str,
        _owner: &str,
        _items: &[ItemSpec],
        _attribute_filters: Option<&[String]>,
    ) -> TransportResult<LegacyUnshelveResponse> {
        self.unshelve_result("ext.unshelve").map(Self::legacy_unshelve)
    }
}

impl Repository4Transport for MockServer {
    fn check_in(
        &self,
        _workspace: &str,
        _owner: &str,
        _server_items: &[String],
        _changeset: &Changeset,
        _info: &CheckinNotificationInfo,
        _flags: CheckinFlags,
        _defer: bool,
        _ticket: i32,
    ) -> TransportResult<CheckinResponse> {
        self.checkin_result("repo4.check_in")
    }

    fn check_in_shelveset(
        &self,
        _shelveset_name: &str,
        _shelveset_owner: &str,
        _changeset_owner: &str,
        _info: &CheckinNotificationInfo,
        _flags: CheckinFlags,
    ) -> TransportResult<CheckinResponse> {
        self.checkin_result("repo4.check_in_shelveset")
    }

    fn get(
        &self,
        _workspace: &str,
        _owner: &str,
        _requests: &[GetRequest],
        _max_results: i32,
        options: GetOptions,
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
    ) -> TransportResult<Rows<GetOperation>> {
        self.get_rows("repo4.get", options)
    }

    fn merge(
        &self,
        _workspace: &str,
        _owner: &str,
        _source: &ItemSpec,
        _target: &str,
        _from: Option<&VersionSpec>,
        _to: Option<&VersionSpec>,
        _lock_level: LockLevel,
        _flags: MergeFlags,
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
    ) -> TransportResult<MergeResponse> {
        self.merge_result("repo4.merge")
    }

    fn pend_changes(
        &self,
        _workspace: &str,
        _owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        _features: SupportedFeatures,
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
    ) -> TransportResult<PendResponse> {
        self.pend("repo4.pend_changes", changes, options)
    }

    fn pend_changes_in_local_workspace(
        &self,
        _workspace: &str,
        _owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        _features: SupportedFeatures,
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
    ) -> TransportResult<PendResponse> {
        self.pend("repo4.pend_changes_in_local_workspace", changes, options)
    }

    fn query_items_extended(
        &self,
        _workspace: Option<&str>,
        _owner: Option<&str>,
        _items: &[ItemSpec],
        _deleted: DeletedState,
        _item_type: ItemType,
        options: GetItemsOptions,
        _property_filters: Option<&[String]>,
    ) -> TransportResult<Option<Rows<ExtendedItem>>> {
        self.items("repo4.query_items_extended", options)
    }

    fn query_pending_changes_for_workspace(
        &self,
        _workspace: &str,
        _owner: &str,
        _items: &[ItemSpec],
        _download_urls: bool,
        _page_size: i32,
        _last_change: Option<&str>,
        _include_merge_info: bool,
        _property_filters: Option<&[String]>,
    ) -> TransportResult<PendingChangesResponse> {
        self.pending_changes("repo4.query_pending_changes_for_workspace")
    }

    fn query_pending_sets(
        &self,
        _local_workspace: Option<&str>,
        _local_owner: Option<&str>,
        _workspace: Option<&str>,
        _owner: Option<&str>,
        _items: &[ItemSpec],
        _download_urls: bool,
        _property_filters: Option<&[String]>,
    ) -> TransportResult<PendingSetsResponse> {
        self.pending_sets("repo4.query_pending_sets")
    }

    fn query_pending_change_signature(&self, _workspace: &str, _owner: &str) -> TransportResult<Uuid> {
        Ok(self.record("repo4.query_pending_change_signature")?.signature)
    }

    fn query_workspace(&self, _workspace: &str, _owner: &str) -> TransportResult<Option<Workspace>> {
        self.workspace("repo4.query_workspace")
    }

    fn reconcile_local_workspace(
        &self,
        _workspace: &str,
        _owner: &str,
        signature: Uuid,
        pending_changes: &[PendingChange],
        local_version_updates: &[ServerItemLocalVersionUpdate],
        clear_local_version_table: bool,
    ) -> TransportResult<ReconcileResult> {
        self.reconcile(
            "repo4.reconcile_local_workspace",
            signature,
            pending_changes,
            local_version_updates,
            clear_local_version_table,
        )
    }

    fn resolve(
        &self,
        _workspace: &str,
        _owner: &str,
        conflict_id: i32,
        _resolution: Resolution,
        _new_path: Option<&str>,
        encoding: i32,
        _lock_level: LockLevel,
        _accept_merge_properties: &[PropertyValue],
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
    ) -> TransportResult<ResolveResponse> {
        self.resolve_result("repo4.resolve", conflict_id, encoding)
    }

    fn rollback(
        &self,
        _workspace: &str,
        _owner: &str,
        _items: &[ItemSpec],
        _item_version: Option<&VersionSpec>,
        _from: Option<&VersionSpec>,
        _to: Option<&VersionSpec>,
        _options: RollbackOptions,
        _lock_level: LockLevel,
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
    ) -> TransportResult<MergeResponse> {
        self.merge_result("repo4.rollback")
    }

    fn undo_pending_changes(
        &self,
        _workspace: &str,
        _owner: &str,
        _items: &[ItemSpec],
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
    ) -> TransportResult<PendResponse> {
        self.pend_result("repo4.undo_pending_changes")
    }

    fn undo_pending_changes_in_local_workspace(
        &self,
        _workspace: &str,
        _owner: &str,
        _items: &[ItemSpec],
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
    ) -> TransportResult<PendResponse> {
        self.pend_result("repo4.undo_pending_changes_in_local_workspace")
    }

    fn unshelve(
        &self,
        _shelveset_name: &str,
        _shelveset_owner: &str,
        _workspace: &str,
        _owner: &str,
        _items: &[ItemSpec],
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
        _shelveset_property_filters: Option<&[String]>,
        _merge: bool,
    ) -> TransportResult<UnshelveResponse> {
        self.unshelve_result("repo4.unshelve")
    }
}

impl Repository5Transport for MockServer {
    fn add_conflict(&self, _workspace: &str, _owner: &str, _conflict: &NewConflict, max_path: i32) -> TransportResult<()> {
        self.record_max_path("repo5.add_conflict", max_path).map(drop)
    }

    fn check_in(
        &self,
        _workspace: &str,
        _owner: &str,
        _server_items: &[String],
        _changeset: &Changeset,
        _info: &CheckinNotificationInfo,
        _flags: CheckinFlags,
        _defer: bool,
        _ticket: i32,
        max_path: i32,
    ) -> TransportResult<CheckinResponse> {
        self.state().max_paths.push(max_path);
        self.checkin_result("repo5.check_in")
    }

    fn check_in_shelveset(
        &self,
        _shelveset_name: &str,
        _shelveset_owner: &str,
        _changeset_owner: &str,
        _info: &CheckinNotificationInfo,
        _flags: CheckinFlags,
        max_path: i32,
    ) -> TransportResult<CheckinResponse> {
        self.state().max_paths.push(max_path);
        self.checkin_result("repo5.check_in_shelveset")
    }

    fn check_pending_changes(
        &self,
        _workspace: &str,
        _owner: &str,
        _server_items: &[String],
        max_path: i32,
    ) -> TransportResult<Vec<Failure>> {
        Ok(self
            .record_max_path("repo5.check_pending_changes", max_path)?
            .failures
            .clone())
    }

    fn get(
        &self,
        _workspace: &str,
        _owner: &str,
        _requests: &[GetRequest],
        _max_results: i32,
        options: GetOptions,
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<Rows<GetOperation>> {
        self.state().max_paths.push(max_path);
        self.get_rows("repo5.get", options)
    }

    fn merge(
        &self,
        _workspace: &str,
        _owner: &str,
        _source: &ItemSpec,
        _target: &str,
        _from: Option<&VersionSpec>,
        _to: Option<&VersionSpec>,
        _lock_level: LockLevel,
        _flags: MergeFlags,
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<MergeResponse> {
        self.state().max_paths.push(max_path);
        self.merge_result("repo5.merge")
    }

    fn pend_changes(
        &self,
        _workspace: &str,
        _owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        _features: SupportedFeatures,
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<PendResponse> {
        self.state().max_paths.push(max_path);
        self.pend("repo5.pend_changes", changes, options)
    }

    fn pend_changes_in_local_workspace(
        &self,
        _workspace: &str,
        _owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        _features: SupportedFeatures,
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<PendResponse> {
        self.state().max_paths.push(max_path);
        self.pend("repo5.pend_changes_in_local_workspace", changes, options)
    }

    fn query_pending_sets(
        &self,
        _local_workspace: Option<&str>,
        _local_owner: Option<&str>,
        _workspace: Option<&str>,
        _owner: Option<&str>,
        _items: &[ItemSpec],
        _download_urls: bool,
        _property_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<PendingSetsResponse> {
        self.state().max_paths.push(max_path);
        self.pending_sets("repo5.query_pending_sets")
    }

    fn reconcile_local_workspace(
        &self,
        _workspace: &str,
        _owner: &str,
        signature: Uuid,
        pending_changes: &[PendingChange],
        local_version_updates: &[ServerItemLocalVersionUpdate],
        clear_local_version_table: bool,
        _throw_on_project_renamed: bool,
        max_path: i32,
    ) -> TransportResult<ReconcileResult> {
        self.state().max_paths.push(max_path);
        self.reconcile(
            "repo5.reconcile_local_workspace",
            signature,
            pending_changes,
            local_version_updates,
            clear_local_version_table,
        )
    }

    fn resolve(
        &self,
        _workspace: &str,
        _owner: &str,
        conflict_id: i32,
        _resolution: Resolution,
        _new_path: Option<&str>,
        encoding: i32,
        _lock_level: LockLevel,
        _accept_merge_properties: &[PropertyValue],
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<ResolveResponse> {
        self.state().max_paths.push(max_path);
        self.resolve_result("repo5.resolve", conflict_id, encoding)
    }

    fn rollback(
        &self,
        _workspace: &str,
        _owner: &str,
        _items: &[ItemSpec],
        _item_version: Option<&VersionSpec>,
        _from: Option<&VersionSpec>,
        _to: Option<&VersionSpec>,
        _options: RollbackOptions,
        _lock_level: LockLevel,
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<MergeResponse> {
        self.state().max_paths.push(max_path);
        self.merge_result("repo5.rollback")
    }

    fn shelve(
        &self,
        _workspace: &str,
        _owner: &str,
        _server_items: &[String],
        _shelveset: &Shelveset,
        _replace: bool,
        max_path: i32,
    ) -> TransportResult<Vec<Failure>> {
        Ok(self.record_max_path("repo5.shelve", max_path)?.failures.clone())
    }

    fn undo_pending_changes(
        &self,
        _workspace: &str,
        _owner: &str,
        _items: &[ItemSpec],
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<PendResponse> {
        self.state().max_paths.push(max_path);
        self.pend_result("repo5.undo_pending_changes")
    }

    fn undo_pending_changes_in_local_workspace(
        &self,
        _workspace: &str,
        _owner: &str,
        _items: &[ItemSpec],
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<PendResponse> {
        self.state().max_paths.push(max_path);
        self.pend_result("repo5.undo_pending_changes_in_local_workspace")
    }

    fn unshelve(
        &self,
        _shelveset_name: &str,
        _shelveset_owner: &str,
        _workspace: &str,
        _owner: &str,
        _items: &[ItemSpec],
        _property_filters: Option<&[String]>,
        _attribute_filters: Option<&[String]>,
        _shelveset_property_filters: Option<&[String]>,
        _merge: bool,
        max_path: i32,
    ) -> TransportResult<UnshelveResponse> {
        self.state().max_paths.push(max_path);
        self.unshelve_result("repo5.unshelve")
    }
}

/// A dispatcher negotiated at `level` against a fresh mock, with one
/// SERVER workspace `ws;alice` registered on computer `box`.
pub(crate) struct Harness {
    pub server: std::sync::Arc<MockServer>,
    pub dispatcher: crate::dispatch::Dispatcher,
    pub config_dir: tempfile::TempDir,
}

impl Harness {
    pub(crate) fn at(level: tfvc_common::ServiceLevel) -> Self {
        use std::sync::Arc;

        use tfvc_common::types::WorkspaceLocation;
        use tfvc_common::ServiceLevel as L;

        use super::{interfaces, TransportSet};
        use crate::events::EventBus;
        use crate::workspace::WorkspaceRegistry;

        let server = Arc::new(MockServer::new());
        let mut transports = TransportSet::new(server.clone());
        if level >= L::Tfs2010 {
            transports = transports.with_extensions(server.clone());
        }
        if level >= L::Tfs2012 {
            transports = transports.with_repository4(server.clone());
        }
        if level >= L::Tfs2012Qu1 {
            transports = transports.with_repository5(server.clone());
        }
        {
            let mut state = server.state();
            let tag = match level {
                L::Tfs2012Update1 => Some(interfaces::VERSION_CONTROL_4_1),
                L::Tfs2012Update2 => Some(interfaces::VERSION_CONTROL_4_2),
                L::Tfs2012Update3 => Some(interfaces::VERSION_CONTROL_4_3),
                L::Tfs2012Qu1Update1 => Some(interfaces::VERSION_CONTROL_5_1),
                _ => None,
            };
            if let Some(tag) = tag {
                state.locations.insert(tag.to_string());
            }
        }

        let registry = Arc::new(WorkspaceRegistry::new("box"));
        let mut ws = Workspace::new("ws", "alice", "box", WorkspaceLocation::Server);
        ws.security_token = Some("token-ws".into());
        registry.register(ws);

        let config_dir = tempfile::TempDir::new().unwrap();
        let dispatcher = crate::dispatch::Dispatcher::new(
            transports,
            server.as_ref(),
            registry,
            Arc::new(EventBus::new()),
            config_dir.path(),
        );
        assert_eq!(dispatcher.service_level(), level);
        server.state().calls.clear();
        Self {
            server,
            dispatcher,
            config_dir,
        }
    }

    pub(crate) fn server_workspace(&self) -> Workspace {
        self.dispatcher
            .workspaces()
            .server_workspace("ws", "alice")
            .unwrap()
    }

    /// Queue edits for the registered workspace.
    pub(crate) fn queue_edits(&self, paths: &[&str]) {
        let ws = self.server_workspace();
        self.dispatcher.replayer().journal_for(&ws).add(paths).unwrap();
    }
}
