// Entry point of the compatibility layer.
//
// Routes each operation either straight to the versioned dispatcher or,
// when the addressed workspace is LOCAL on this machine, through the
// local-workspace strategy first.

use std::path::PathBuf;

use uuid::Uuid;

use tfvc_common::flags::{
    CheckinFlags, GetItemsOptions, GetOptions, MergeFlags, PendChangesOptions, RollbackOptions,
    SupportedFeatures,
};
use tfvc_common::types::{
    ChangeRequest, Changeset, CheckinNotificationInfo, Conflict, DeletedState, ExtendedItem,
    Failure, GetOperation, GetRequest, HistoryQuery, ItemSpec, ItemType, LocalVersion, LockLevel,
    NewConflict, PendingChange, ReconcileResult, ServerItemLocalVersionUpdate, Shelveset,
    VersionSpec, Workspace,
};
use tfvc_common::{ServiceLevel, VcError};

use crate::dispatch::{
    CheckinOutcome, Dispatcher, MergeOutcome, PendOutcome, PendingChangesOutcome,
    PendingSetsOutcome, ResolveErrorOptions, ResolveHandler, UnshelveOutcome,
};
use crate::history::{HistoryIterator, HistorySource};
use crate::local::LocalWorkspaceStrategy;

#[derive(Debug)]
pub struct VersionControlLayer {
    dispatcher: Dispatcher,
    local: Option<LocalWorkspaceStrategy>,
}

impl VersionControlLayer {
    /// A layer without local-workspace support: every call goes online.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            local: None,
        }
    }

    /// Install the local-workspace strategy with its tables under
    /// `configuration_dir`.
    pub fn with_local_workspaces(mut self, configuration_dir: impl Into<PathBuf>) -> Self {
        self.local = Some(LocalWorkspaceStrategy::new(configuration_dir));
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn local(&self) -> Option<&LocalWorkspaceStrategy> {
        self.local.as_ref()
    }

    pub fn service_level(&self) -> ServiceLevel {
        self.dispatcher.service_level()
    }

    pub fn supported_features(&self) -> Result<SupportedFeatures, VcError> {
        self.dispatcher.supported_features()
    }

    /// The strategy and workspace info when `name`/`owner` is LOCAL here.
    fn local_target(&self, name: &str, owner: &str) -> Option<(&LocalWorkspaceStrategy, Workspace)> {
        let local = self.local.as_ref()?;
        let ws = self.dispatcher.workspaces().local_workspace(name, owner)?;
        Some((local, ws))
    }

    fn reconcile_if_local(&self, name: &str, owner: &str) -> Result<(), VcError> {
        if let Some(local) = &self.local {
            local.reconcile_if_local(&self.dispatcher, name, owner, false, false)?;
        }
        Ok(())
    }

    fn reconcile_version_specs(&self, specs: &[Option<&VersionSpec>]) -> Result<(), VcError> {
        if let Some(local) = &self.local {
            for spec in specs {
                local.reconcile_version_spec(&self.dispatcher, *spec)?;
            }
        }
        Ok(())
    }

    // ── Workspaces ──────────────────────────────────────────────────

    /// Create a workspace and remember it for later routing.
    pub fn create_workspace(&self, workspace: &Workspace) -> Result<Workspace, VcError> {
        let created = self.dispatcher.create_workspace(workspace)?;
        self.dispatcher.workspaces().register(created.clone());
        Ok(created)
    }

    pub fn update_workspace(
        &self,
        old_name: &str,
        owner: &str,
        workspace: &Workspace,
        features: SupportedFeatures,
    ) -> Result<Workspace, VcError> {
        match self.local_target(old_name, owner) {
            Some((local, ws)) => {
                local.update_workspace(&self.dispatcher, old_name, &ws, workspace, features)
            }
            None => {
                let updated = self
                    .dispatcher
                    .update_workspace(old_name, owner, workspace, features)?;
                let registry = self.dispatcher.workspaces();
                if registry.get(old_name, owner).is_some() {
                    registry.remove(old_name, owner);
                    registry.register(updated.clone());
                }
                Ok(updated)
            }
        }
    }

    pub fn query_workspace(&self, workspace: &str, owner: &str) -> Result<Option<Workspace>, VcError> {
        match self.local_target(workspace, owner) {
            Some((local, ws)) => local.query_workspace(&self.dispatcher, &ws),
            None => self.dispatcher.query_workspace(workspace, owner),
        }
    }

    // ── Pending changes ─────────────────────────────────────────────

    pub fn pend_changes(
        &self,
        workspace: &str,
        owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        features: SupportedFeatures,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<PendOutcome, VcError> {
        match self.local_target(workspace, owner) {
            Some((local, ws)) => local.pend_changes(
                &self.dispatcher,
                &ws,
                changes,
                options,
                features,
                property_filters,
                attribute_filters,
            ),
            None => self.dispatcher.pend_changes(
                workspace,
                owner,
                changes,
                options,
                features,
                property_filters,
                attribute_filters,
            ),
        }
    }

    /// Server-side pend for a local workspace, without reconcile or re-sync.
    pub fn pend_changes_in_local_workspace(
        &self,
        workspace: &str,
        owner: &str,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        features: SupportedFeatures,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<PendOutcome, VcError> {
        self.dispatcher.pend_changes_in_local_workspace(
            workspace,
            owner,
            changes,
            options,
            features,
            property_filters,
            attribute_filters,
        )
    }

    pub fn undo_pending_changes(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<PendOutcome, VcError> {
        match self.local_target(workspace, owner) {
            Some((local, ws)) => local.undo_pending_changes(
                &self.dispatcher,
                &ws,
                items,
                property_filters,
                attribute_filters,
            ),
            None => self.dispatcher.undo_pending_changes(
                workspace,
                owner,
                items,
                property_filters,
                attribute_filters,
            ),
        }
    }

    pub fn undo_pending_changes_in_local_workspace(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<PendOutcome, VcError> {
        self.dispatcher.undo_pending_changes_in_local_workspace(
            workspace,
            owner,
            items,
            property_filters,
            attribute_filters,
        )
    }

    pub fn get(
        &self,
        workspace: &str,
        owner: &str,
        requests: &[GetRequest],
        max_results: i32,
        options: GetOptions,
        no_get: bool,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<Vec<Vec<GetOperation>>, VcError> {
        match self.local_target(workspace, owner) {
            Some((local, ws)) => local.get(
                &self.dispatcher,
                &ws,
                requests,
                max_results,
                options,
                no_get,
                property_filters,
                attribute_filters,
            ),
            None => self.dispatcher.get(
                workspace,
                owner,
                requests,
                max_results,
                options,
                no_get,
                property_filters,
                attribute_filters,
            ),
        }
    }

    pub fn merge(
        &self,
        workspace: &str,
        owner: &str,
        source: &ItemSpec,
        target: &str,
        from: Option<&VersionSpec>,
        to: Option<&VersionSpec>,
        lock_level: LockLevel,
        flags: MergeFlags,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<MergeOutcome, VcError> {
        self.reconcile_version_specs(&[from, to])?;
        match self.local_target(workspace, owner) {
            Some((local, ws)) => local.merge(
                &self.dispatcher,
                &ws,
                source,
                target,
                from,
                to,
                lock_level,
                flags,
                property_filters,
                attribute_filters,
            ),
            None => self.dispatcher.merge(
                workspace,
                owner,
                source,
                target,
                from,
                to,
                lock_level,
                flags,
                property_filters,
                attribute_filters,
            ),
        }
    }

    pub fn rollback(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        item_version: Option<&VersionSpec>,
        from: Option<&VersionSpec>,
        to: Option<&VersionSpec>,
        options: RollbackOptions,
        lock_level: LockLevel,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<MergeOutcome, VcError> {
        self.reconcile_version_specs(&[item_version, from, to])?;
        match self.local_target(workspace, owner) {
            Some((local, ws)) => local.rollback(
                &self.dispatcher,
                &ws,
                items,
                item_version,
                from,
                to,
                options,
                lock_level,
                property_filters,
                attribute_filters,
            ),
            None => self.dispatcher.rollback(
                workspace,
                owner,
                items,
                item_version,
                from,
                to,
                options,
                lock_level,
                property_filters,
                attribute_filters,
            ),
        }
    }

    pub fn unshelve(
        &self,
        shelveset_name: &str,
        shelveset_owner: &str,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        property_filters: &[String],
        attribute_filters: &[String],
        shelveset_property_filters: &[String],
        merge: bool,
    ) -> Result<UnshelveOutcome, VcError> {
        match self.local_target(workspace, owner) {
            Some((local, ws)) => local.unshelve(
                &self.dispatcher,
                shelveset_name,
                shelveset_owner,
                &ws,
                items,
                property_filters,
                attribute_filters,
                shelveset_property_filters,
                merge,
            ),
            None => self.dispatcher.unshelve(
                shelveset_name,
                shelveset_owner,
                workspace,
                owner,
                items,
                property_filters,
                attribute_filters,
                shelveset_property_filters,
                merge,
            ),
        }
    }

    // ── Check-in and shelving ───────────────────────────────────────

    pub fn add_conflict(&self, workspace: &str, owner: &str, conflict: &NewConflict) -> Result<(), VcError> {
        match self.local_target(workspace, owner) {
            Some((local, ws)) => local.add_conflict(&self.dispatcher, &ws, conflict),
            None => self.dispatcher.add_conflict(workspace, owner, conflict),
        }
    }

    pub fn check_in(
        &self,
        workspace: &str,
        owner: &str,
        server_items: &[String],
        changeset: &Changeset,
        info: &CheckinNotificationInfo,
        flags: CheckinFlags,
        defer: bool,
        ticket: i32,
    ) -> Result<CheckinOutcome, VcError> {
        match self.local_target(workspace, owner) {
            Some((local, ws)) => local.check_in(
                &self.dispatcher,
                &ws,
                server_items,
                changeset,
                info,
                flags,
                defer,
                ticket,
            ),
            None => self.dispatcher.check_in(
                workspace,
                owner,
                server_items,
                changeset,
                info,
                flags,
                defer,
                ticket,
            ),
        }
    }

    pub fn check_in_shelveset(
        &self,
        shelveset_name: &str,
        shelveset_owner: &str,
        changeset_owner: &str,
        info: &CheckinNotificationInfo,
        flags: CheckinFlags,
    ) -> Result<CheckinOutcome, VcError> {
        self.dispatcher
            .check_in_shelveset(shelveset_name, shelveset_owner, changeset_owner, info, flags)
    }

    pub fn check_pending_changes(
        &self,
        workspace: &str,
        owner: &str,
        server_items: &[String],
    ) -> Result<Vec<Failure>, VcError> {
        match self.local_target(workspace, owner) {
            Some((local, ws)) => local.check_pending_changes(&self.dispatcher, &ws, server_items),
            None => self.dispatcher.check_pending_changes(workspace, owner, server_items),
        }
    }

    pub fn shelve(
        &self,
        workspace: &str,
        owner: &str,
        server_items: &[String],
        shelveset: &Shelveset,
        replace: bool,
    ) -> Result<Vec<Failure>, VcError> {
        match self.local_target(workspace, owner) {
            Some((local, ws)) => {
                local.shelve(&self.dispatcher, &ws, server_items, shelveset, replace)
            }
            None => self
                .dispatcher
                .shelve(workspace, owner, server_items, shelveset, replace),
        }
    }

    // ── Conflicts ───────────────────────────────────────────────────

    pub fn query_conflicts(&self, workspace: &str, owner: &str, items: &[ItemSpec]) -> Result<Vec<Conflict>, VcError> {
        match self.local_target(workspace, owner) {
            Some((local, ws)) => local.query_conflicts(&self.dispatcher, &ws, items),
            None => self.dispatcher.query_conflicts(workspace, owner, items),
        }
    }

    pub fn resolve(
        &self,
        workspace: &str,
        owner: &str,
        conflicts: &[Conflict],
        property_filters: &[String],
        attribute_filters: &[String],
        error_options: ResolveErrorOptions,
        handler: &mut dyn ResolveHandler,
    ) -> Result<(), VcError> {
        match self.local_target(workspace, owner) {
            Some((local, ws)) => local.resolve(
                &self.dispatcher,
                &ws,
                conflicts,
                property_filters,
                attribute_filters,
                error_options,
                handler,
            ),
            None => self.dispatcher.resolve(
                workspace,
                owner,
                conflicts,
                property_filters,
                attribute_filters,
                error_options,
                handler,
            ),
        }
    }

    pub fn remove_local_conflicts(
        &self,
        workspace: &str,
        owner: &str,
        conflicts: &[Conflict],
        error_options: ResolveErrorOptions,
        handler: &mut dyn ResolveHandler,
    ) -> Result<(), VcError> {
        match self.local_target(workspace, owner) {
            Some((local, ws)) => {
                local.remove_local_conflicts(&self.dispatcher, &ws, conflicts, error_options, handler)
            }
            None => self
                .dispatcher
                .remove_local_conflicts(workspace, owner, conflicts, error_options, handler),
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn query_history(&self, query: &HistoryQuery) -> Result<Vec<Changeset>, VcError> {
        let target = match (&query.workspace_name, &query.workspace_owner) {
            (Some(name), Some(owner)) => self.local_target(name, owner),
            _ => None,
        };
        match target {
            Some((local, ws)) => local.query_history(&self.dispatcher, &ws, query),
            None => self.dispatcher.query_history(query),
        }
    }

    /// Iterate history newest first, fetching pages on demand.
    pub fn query_history_iter(&self, query: HistoryQuery) -> Result<HistoryIterator<'_, Self>, VcError> {
        HistoryIterator::new(self, query)
    }

    pub fn query_items_extended(
        &self,
        workspace: Option<&str>,
        owner: Option<&str>,
        items: &[ItemSpec],
        deleted: DeletedState,
        item_type: ItemType,
        options: GetItemsOptions,
        property_filters: &[String],
    ) -> Result<Vec<Vec<ExtendedItem>>, VcError> {
        let target = match (workspace, owner) {
            (Some(name), Some(owner)) => self.local_target(name, owner),
            _ => None,
        };
        match target {
            Some((local, ws)) => local.query_items_extended(
                &self.dispatcher,
                &ws,
                items,
                deleted,
                item_type,
                options,
                property_filters,
            ),
            None => self.dispatcher.query_items_extended(
                workspace,
                owner,
                items,
                deleted,
                item_type,
                options,
                property_filters,
            ),
        }
    }

    pub fn query_local_versions(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
    ) -> Result<Vec<Vec<LocalVersion>>, VcError> {
        match self.local_target(workspace, owner) {
            Some((local, ws)) => local.query_local_versions(&ws, items),
            None => self.dispatcher.query_local_versions(workspace, owner, items),
        }
    }

    pub fn query_pending_changes_for_workspace(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        download_urls: bool,
        include_merge_info: bool,
        property_filters: &[String],
    ) -> Result<PendingChangesOutcome, VcError> {
        match self.local_target(workspace, owner) {
            Some((local, ws)) => local.query_pending_changes_for_workspace(
                &self.dispatcher,
                &ws,
                items,
                download_urls,
                include_merge_info,
                property_filters,
            ),
            None => self.dispatcher.query_pending_changes_for_workspace(
                workspace,
                owner,
                items,
                download_urls,
                include_merge_info,
                property_filters,
            ),
        }
    }

    /// Pending sets across workspaces. The caller's own workspace is
    /// reconciled first when it is local.
    pub fn query_pending_sets(
        &self,
        local_workspace: Option<&str>,
        local_owner: Option<&str>,
        workspace: Option<&str>,
        owner: Option<&str>,
        items: &[ItemSpec],
        download_urls: bool,
        property_filters: Option<&[String]>,
    ) -> Result<PendingSetsOutcome, VcError> {
        if let (Some(name), Some(local_owner)) = (local_workspace, local_owner) {
            self.reconcile_if_local(name, local_owner)?;
        }
        self.dispatcher.query_pending_sets(
            local_workspace,
            local_owner,
            workspace,
            owner,
            items,
            download_urls,
            property_filters,
        )
    }

    pub fn query_pending_change_signature(&self, workspace: &str, owner: &str) -> Result<Uuid, VcError> {
        self.dispatcher.query_pending_change_signature(workspace, owner)
    }

    pub fn reconcile_local_workspace(
        &self,
        workspace: &str,
        owner: &str,
        signature: Uuid,
        pending_changes: &[PendingChange],
        local_version_updates: &[ServerItemLocalVersionUpdate],
        clear_local_version_table: bool,
        throw_on_project_renamed: bool,
    ) -> Result<ReconcileResult, VcError> {
        self.dispatcher.reconcile_local_workspace(
            workspace,
            owner,
            signature,
            pending_changes,
            local_version_updates,
            clear_local_version_table,
            throw_on_project_renamed,
        )
    }
}

impl HistorySource for VersionControlLayer {
    fn query_history(&self, query: &HistoryQuery) -> Result<Vec<Changeset>, VcError> {
        VersionControlLayer::query_history(self, query)
    }
}
