// Transport seam: one trait per protocol generation.
//
// Each trait exposes only the parameters its generation understands. The
// dispatcher is the only caller; nothing else in the crate talks to a
// transport directly. Implementations are synchronous and block the
// calling thread for the duration of the round trip.

pub mod wire;

#[cfg(test)]
pub(crate) mod mock;

use std::sync::Arc;

use uuid::Uuid;

use tfvc_common::flags::{
    CheckinFlags, GetItemsOptions, GetOptions, MergeFlags, PendChangesOptions, RollbackOptions,
    SupportedFeatures,
};
use tfvc_common::types::{
    ChangeRequest, Changeset, CheckinNotificationInfo, Conflict, DeletedState, ExtendedItem,
    Failure, GetOperation, GetRequest, HistoryQuery, ItemSpec, ItemType, LocalVersion, LockLevel,
    NewConflict, PendingChange, PropertyValue, ReconcileResult, RepositoryProperties, Resolution,
    ServerItemLocalVersionUpdate, Shelveset, VersionSpec, Workspace,
};
use tfvc_common::{ServiceLevel, TransportFault, VcError};

use wire::{
    CheckinResponse, LegacyCheckinResponse, LegacyMergeResponse, LegacyPendResponse,
    LegacyResolveResponse, LegacyUnshelveResponse, MergeResponse, PendResponse,
    PendingChangesResponse, PendingSetsResponse, ResolveResponse, UnshelveResponse,
};

pub type TransportResult<T> = Result<T, TransportFault>;

/// Rows of a multi-item-spec query; a `None` row is "no data for that spec".
pub type Rows<T> = Vec<Option<Vec<T>>>;

// ── Location probing ────────────────────────────────────────────────

/// Registration tags probed during negotiation.
pub mod interfaces {
    pub const VERSION_CONTROL_4_1: &str = "VersionControl4.1";
    pub const VERSION_CONTROL_4_2: &str = "VersionControl4.2";
    pub const VERSION_CONTROL_4_3: &str = "VersionControl4.3";
    pub const VERSION_CONTROL_5: &str = "VersionControl5";
    pub const VERSION_CONTROL_5_1: &str = "VersionControl5.1";
}

/// Resolves an interface tag to its service URL. `None` means the server
/// does not register that interface, which is not an error.
pub trait LocationService: Send + Sync {
    fn location_for(&self, interface: &str) -> Option<String>;
}

// ── Generations ─────────────────────────────────────────────────────

/// The first-generation repository service. Always present.
pub trait RepositoryTransport: Send + Sync {
    fn get_repository_properties(&self) -> TransportResult<RepositoryProperties>;

    fn add_conflict(&self, workspace: &str, owner: &str, conflict: &NewConflict) -> TransportResult<()>;

    fn check_in(
        &self,
        workspace: &str,
        owner: &str,
        server_items: &[String],
        changeset: &Changeset,
        info: &CheckinNotificationInfo,
        flags: CheckinFlags,
    ) -> TransportResult<LegacyCheckinResponse>;

    fn check_pending_changes(
        &self,
        workspace: &str,
        owner: &str,
        server_items: &[String],
    ) -> TransportResult<Vec<Failure>>;

    fn create_workspace(&self, workspace: &Workspace) -> TransportResult<Workspace>;

    fn update_workspace(
        &self,
        old_name: &str,
        owner: &str,
        workspace: &Workspace,
        features: SupportedFeatures,
    ) -> TransportResult<Workspace>;

    fn get(
        &self,
        workspace: &str,
        owner: &str,
        requests: &[GetRequest],
        get_all: bool,
        preview: bool,
        max_results: i32,
        options: GetOptions,
    ) -> TransportResult<Rows<GetOperation>>;

    fn merge(
        &self,
        workspace: &str,
        owner: &str,
        source: &ItemSpec,
        target: &str,
        from: Option<&VersionSpec>,
        to: Option<&VersionSpec>,
        lock_level: LockLevel,
        flags: MergeFlags,
    ) -> TransportResult<LegacyMergeResponse>;

    fn pend_changes(
        &self,
        workspace: &str,
        owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        features: SupportedFeatures,
    ) -> TransportResult<LegacyPendResponse>;

    fn query_conflicts(&self, workspace: &str, owner: &str, items: &[ItemSpec]) -> TransportResult<Vec<Conflict>>;

    fn query_history(&self, query: &HistoryQuery) -> TransportResult<Vec<Changeset>>;

    fn query_items_extended(
        &self,
        workspace: Option<&str>,
        owner: Option<&str>,
        items: &[ItemSpec],
        deleted: DeletedState,
        item_type: ItemType,
        options: GetItemsOptions,
    ) -> TransportResult<Option<Rows<ExtendedItem>>>;

    fn query_local_versions(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
    ) -> TransportResult<Option<Rows<LocalVersion>>>;

    fn query_pending_sets(
        &self,
        local_workspace: Option<&str>,
        local_owner: Option<&str>,
        workspace: Option<&str>,
        owner: Option<&str>,
        items: &[ItemSpec],
        download_urls: bool,
    ) -> TransportResult<PendingSetsResponse>;

    fn query_workspace(&self, workspace: &str, owner: &str) -> TransportResult<Option<Workspace>>;

    fn remove_local_conflict(&self, workspace: &str, owner: &str, conflict_id: i32) -> TransportResult<()>;

    fn resolve(
        &self,
        workspace: &str,
        owner: &str,
        conflict_id: i32,
        resolution: Resolution,
        new_path: Option<&str>,
        encoding: i32,
        lock_level: LockLevel,
    ) -> TransportResult<LegacyResolveResponse>;

    fn shelve(
        &self,
        workspace: &str,
        owner: &str,
        server_items: &[String],
        shelveset: &Shelveset,
        replace: bool,
    ) -> TransportResult<Vec<Failure>>;

    fn undo_pending_changes(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
    ) -> TransportResult<LegacyPendResponse>;

    fn unshelve(
        &self,
        shelveset_name: &str,
        shelveset_owner: &str,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
    ) -> TransportResult<LegacyUnshelveResponse>;
}

/// 2010 extensions: attribute filters, deferred check-in, change-pended flags.
pub trait ExtensionsTransport: Send + Sync {
    fn check_in(
        &self,
        workspace: &str,
        owner: &str,
        server_items: &[String],
        changeset: &Changeset,
        info: &CheckinNotificationInfo,
        flags: CheckinFlags,
        defer: bool,
        ticket: i32,
    ) -> TransportResult<LegacyCheckinResponse>;

    fn check_in_shelveset(
        &self,
        shelveset_name: &str,
        shelveset_owner: &str,
        changeset_owner: &str,
        info: &CheckinNotificationInfo,
        flags: CheckinFlags,
    ) -> TransportResult<LegacyCheckinResponse>;

    fn get(
        &self,
        workspace: &str,
        owner: &str,
        requests: &[GetRequest],
        max_results: i32,
        options: GetOptions,
        attribute_filters: Option<&[String]>,
    ) -> TransportResult<Rows<GetOperation>>;

    fn merge(
        &self,
        workspace: &str,
        owner: &str,
        source: &ItemSpec,
        target: &str,
        from: Option<&VersionSpec>,
        to: Option<&VersionSpec>,
        lock_level: LockLevel,
        flags: MergeFlags,
        attribute_filters: Option<&[String]>,
    ) -> TransportResult<MergeResponse>;

    fn pend_changes(
        &self,
        workspace: &str,
        owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        features: SupportedFeatures,
        attribute_filters: Option<&[String]>,
    ) -> TransportResult<PendResponse>;

    fn query_pending_changes_for_workspace(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        download_urls: bool,
        page_size: i32,
        last_change: Option<&str>,
        include_merge_info: bool,
    ) -> TransportResult<PendingChangesResponse>;

    fn resolve(
        &self,
        workspace: &str,
        owner: &str,
        conflict_id: i32,
        resolution: Resolution,
        new_path: Option<&str>,
        encoding: i32,
        lock_level: LockLevel,
        attribute_filters: Option<&[String]>,
    ) -> TransportResult<ResolveResponse>;

    fn rollback(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        item_version: Option<&VersionSpec>,
        from: Option<&VersionSpec>,
        to: Option<&VersionSpec>,
        options: RollbackOptions,
        lock_level: LockLevel,
        attribute_filters: Option<&[String]>,
    ) -> TransportResult<MergeResponse>;

    fn undo_pending_changes(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        attribute_filters: Option<&[String]>,
    ) -> TransportResult<PendResponse>;

    fn unshelve(
        &self,
        shelveset_name: &str,
        shelveset_owner: &str,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        attribute_filters: Option<&[String]>,
    ) -> TransportResult<LegacyUnshelveResponse>;
}

/// 2012 repository: property filters, local workspaces, reconcile.
pub trait Repository4Transport: Send + Sync {
    fn check_in(
        &self,
        workspace: &str,
        owner: &str,
        server_items: &[String],
        changeset: &Changeset,
        info: &CheckinNotificationInfo,
        flags: CheckinFlags,
        defer: bool,
        ticket: i32,
    ) -> TransportResult<CheckinResponse>;

    fn check_in_shelveset(
        &self,
        shelveset_name: &str,
        shelveset_owner: &str,
        changeset_owner: &str,
        info: &CheckinNotificationInfo,
        flags: CheckinFlags,
    ) -> TransportResult<CheckinResponse>;

    fn get(
        &self,
        workspace: &str,
        owner: &str,
        requests: &[GetRequest],
        max_results: i32,
        options: GetOptions,
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
    ) -> TransportResult<Rows<GetOperation>>;

    fn merge(
        &self,
        workspace: &str,
        owner: &str,
        source: &ItemSpec,
        target: &str,
        from: Option<&VersionSpec>,
        to: Option<&VersionSpec>,
        lock_level: LockLevel,
        flags: MergeFlags,
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
    ) -> TransportResult<MergeResponse>;

    fn pend_changes(
        &self,
        workspace: &str,
        owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        features: SupportedFeatures,
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
    ) -> TransportResult<PendResponse>;

    fn pend_changes_in_local_workspace(
        &self,
        workspace: &str,
        owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        features: SupportedFeatures,
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
    ) -> TransportResult<PendResponse>;

    fn query_items_extended(
        &self,
        workspace: Option<&str>,
        owner: Option<&str>,
        items: &[ItemSpec],
        deleted: DeletedState,
        item_type: ItemType,
        options: GetItemsOptions,
        property_filters: Option<&[String]>,
    ) -> TransportResult<Option<Rows<ExtendedItem>>>;

    fn query_pending_changes_for_workspace(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        download_urls: bool,
        page_size: i32,
        last_change: Option<&str>,
        include_merge_info: bool,
        property_filters: Option<&[String]>,
    ) -> TransportResult<PendingChangesResponse>;

    fn query_pending_sets(
        &self,
        local_workspace: Option<&str>,
        local_owner: Option<&str>,
        workspace: Option<&str>,
        owner: Option<&str>,
        items: &[ItemSpec],
        download_urls: bool,
        property_filters: Option<&[String]>,
    ) -> TransportResult<PendingSetsResponse>;

    fn query_pending_change_signature(&self, workspace: &str, owner: &str) -> TransportResult<Uuid>;

    fn query_workspace(&self, workspace: &str, owner: &str) -> TransportResult<Option<Workspace>>;

    fn reconcile_local_workspace(
        &self,
        workspace: &str,
        owner: &str,
        signature: Uuid,
        pending_changes: &[PendingChange],
        local_version_updates: &[ServerItemLocalVersionUpdate],
        clear_local_version_table: bool,
    ) -> TransportResult<ReconcileResult>;

    fn resolve(
        &self,
        workspace: &str,
        owner: &str,
        conflict_id: i32,
        resolution: Resolution,
        new_path: Option<&str>,
        encoding: i32,
        lock_level: LockLevel,
        accept_merge_properties: &[PropertyValue],
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
    ) -> TransportResult<ResolveResponse>;

    fn rollback(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        item_version: Option<&VersionSpec>,
        from: Option<&VersionSpec>,
        to: Option<&VersionSpec>,
        options: RollbackOptions,
        lock_level: LockLevel,
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
    ) -> TransportResult<MergeResponse>;

    fn undo_pending_changes(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
    ) -> TransportResult<PendResponse>;

    fn undo_pending_changes_in_local_workspace(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
    ) -> TransportResult<PendResponse>;

    fn unshelve(
        &self,
        shelveset_name: &str,
        shelveset_owner: &str,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
        shelveset_property_filters: Option<&[String]>,
        merge: bool,
    ) -> TransportResult<UnshelveResponse>;
}

/// 2012 QU1 repository. Every call carries the maximum server path size.
pub trait Repository5Transport: Send + Sync {
    fn add_conflict(
        &self,
        workspace: &str,
        owner: &str,
        conflict: &NewConflict,
        max_path: i32,
    ) -> TransportResult<()>;

    fn check_in(
        &self,
        workspace: &str,
        owner: &str,
        server_items: &[String],
        changeset: &Changeset,
        info: &CheckinNotificationInfo,
        flags: CheckinFlags,
        defer: bool,
        ticket: i32,
        max_path: i32,
    ) -> TransportResult<CheckinResponse>;

    fn check_in_shelveset(
        &self,
        shelveset_name: &str,
        shelveset_owner: &str,
        changeset_owner: &str,
        info: &CheckinNotificationInfo,
        flags: CheckinFlags,
        max_path: i32,
    ) -> TransportResult<CheckinResponse>;

    fn check_pending_changes(
        &self,
        workspace: &str,
        owner: &str,
        server_items: &[String],
        max_path: i32,
    ) -> TransportResult<Vec<Failure>>;

    fn get(
        &self,
        workspace: &str,
        owner: &str,
        requests: &[GetRequest],
        max_results: i32,
        options: GetOptions,
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<Rows<GetOperation>>;

    fn merge(
        &self,
        workspace: &str,
        owner: &str,
        source: &ItemSpec,
        target: &str,
        from: Option<&VersionSpec>,
        to: Option<&VersionSpec>,
        lock_level: LockLevel,
        flags: MergeFlags,
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<MergeResponse>;

    fn pend_changes(
        &self,
        workspace: &str,
        owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        features: SupportedFeatures,
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<PendResponse>;

    fn pend_changes_in_local_workspace(
        &self,
        workspace: &str,
        owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        features: SupportedFeatures,
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<PendResponse>;

    fn query_pending_sets(
        &self,
        local_workspace: Option<&str>,
        local_owner: Option<&str>,
        workspace: Option<&str>,
        owner: Option<&str>,
        items: &[ItemSpec],
        download_urls: bool,
        property_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<PendingSetsResponse>;

    fn reconcile_local_workspace(
        &self,
        workspace: &str,
        owner: &str,
        signature: Uuid,
        pending_changes: &[PendingChange],
        local_version_updates: &[ServerItemLocalVersionUpdate],
        clear_local_version_table: bool,
        throw_on_project_renamed: bool,
        max_path: i32,
    ) -> TransportResult<ReconcileResult>;

    fn resolve(
        &self,
        workspace: &str,
        owner: &str,
        conflict_id: i32,
        resolution: Resolution,
        new_path: Option<&str>,
        encoding: i32,
        lock_level: LockLevel,
        accept_merge_properties: &[PropertyValue],
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<ResolveResponse>;

    fn rollback(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        item_version: Option<&VersionSpec>,
        from: Option<&VersionSpec>,
        to: Option<&VersionSpec>,
        options: RollbackOptions,
        lock_level: LockLevel,
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<MergeResponse>;

    fn shelve(
        &self,
        workspace: &str,
        owner: &str,
        server_items: &[String],
        shelveset: &Shelveset,
        replace: bool,
        max_path: i32,
    ) -> TransportResult<Vec<Failure>>;

    fn undo_pending_changes(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<PendResponse>;

    fn undo_pending_changes_in_local_workspace(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
        max_path: i32,
    ) -> TransportResult<PendResponse>;

    fn unshelve(
        &self,
        shelveset_name: &str,
        shelveset_owner: &str,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        property_filters: Option<&[String]>,
        attribute_filters: Option<&[String]>,
        shelveset_property_filters: Option<&[String]>,
        merge: bool,
        max_path: i32,
    ) -> TransportResult<UnshelveResponse>;
}

// ── Handle set ──────────────────────────────────────────────────────

/// The transport handles a connection was built with. Only the oldest
/// generation is mandatory.
#[derive(Clone)]
pub struct TransportSet {
    pub repository: Arc<dyn RepositoryTransport>,
    pub extensions: Option<Arc<dyn ExtensionsTransport>>,
    pub repository4: Option<Arc<dyn Repository4Transport>>,
    pub repository5: Option<Arc<dyn Repository5Transport>>,
}

impl TransportSet {
    pub fn new(repository: Arc<dyn RepositoryTransport>) -> Self {
        Self {
            repository,
            extensions: None,
            repository4: None,
            repository5: None,
        }
    }

    pub fn with_extensions(mut self, extensions: Arc<dyn ExtensionsTransport>) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn with_repository4(mut self, repository4: Arc<dyn Repository4Transport>) -> Self {
        self.repository4 = Some(repository4);
        self
    }

    pub fn with_repository5(mut self, repository5: Arc<dyn Repository5Transport>) -> Self {
        self.repository5 = Some(repository5);
        self
    }

    pub(crate) fn extensions(&self) -> Result<&dyn ExtensionsTransport, VcError> {
        self.extensions
            .as_deref()
            .ok_or_else(|| missing_handle(ServiceLevel::Tfs2010))
    }

    pub(crate) fn repository4(&self) -> Result<&dyn Repository4Transport, VcError> {
        self.repository4
            .as_deref()
            .ok_or_else(|| missing_handle(ServiceLevel::Tfs2012))
    }

    pub(crate) fn repository5(&self) -> Result<&dyn Repository5Transport, VcError> {
        self.repository5
            .as_deref()
            .ok_or_else(|| missing_handle(ServiceLevel::Tfs2012Qu1))
    }
}

impl std::fmt::Debug for TransportSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSet")
            .field("extensions", &self.extensions.is_some())
            .field("repository4", &self.repository4.is_some())
            .field("repository5", &self.repository5.is_some())
            .finish()
    }
}

fn missing_handle(level: ServiceLevel) -> VcError {
    VcError::VersionControl(format!("no transport handle for protocol generation {level}"))
}
