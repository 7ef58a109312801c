// Read-side operations and local-workspace reconcile.

use tracing::debug;
use uuid::Uuid;

use tfvc_common::flags::GetItemsOptions;
use tfvc_common::path::server;
use tfvc_common::types::{
    Changeset, Conflict, DeletedState, ExtendedItem, HistoryQuery, ItemSpec, ItemType,
    LocalVersion, PendingChange, ReconcileResult, ServerItemLocalVersionUpdate,
};
use tfvc_common::{map_fault, ServiceLevel, VcError};

use super::ladder::Ladder;
use super::{Dispatcher, PendingChangesOutcome, PendingSetsOutcome, MAX_PATH};

impl Dispatcher {
    pub fn query_conflicts(&self, workspace: &str, owner: &str, items: &[ItemSpec]) -> Result<Vec<Conflict>, VcError> {
        self.playback_queued_edits(workspace, owner, &[]);
        self.transports()
            .repository
            .query_conflicts(workspace, owner, items)
            .map_err(map_fault)
    }

    /// One page of history. Use [`crate::history::HistoryIterator`] for
    /// more than `query.max_count` changesets.
    pub fn query_history(&self, query: &HistoryQuery) -> Result<Vec<Changeset>, VcError> {
        if let (Some(name), Some(owner)) = (&query.workspace_name, &query.workspace_owner) {
            self.playback_queued_edits(name, owner, &[]);
        }
        self.transports()
            .repository
            .query_history(query)
            .map_err(map_fault)
    }

    /// Extended item info, one row per item spec. Every row is sorted by
    /// target server path; a missing row comes back empty.
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
        if !property_filters.is_empty() {
            self.require_service_level(ServiceLevel::Tfs2012Update2, "item property filters")?;
        }
        if let (Some(name), Some(owner)) = (workspace, owner) {
            self.playback_queued_edits(name, owner, &[]);
        }

        // LOCAL_ONLY is answered from local tables and never sent.
        let wire_options = options - GetItemsOptions::LOCAL_ONLY;
        let t = self.transports();
        let rows = Ladder::new("query_items_extended")
            .rung(ServiceLevel::Tfs2012Update2, || {
                t.repository4()?
                    .query_items_extended(workspace, owner, items, deleted, item_type, wire_options, Some(property_filters))
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::PreTfs2010, || {
                t.repository
                    .query_items_extended(workspace, owner, items, deleted, item_type, wire_options)
                    .map_err(map_fault)
            })
            .run(self.service_level())?;

        let Some(rows) = rows else {
            return Ok(items.iter().map(|_| Vec::new()).collect());
        };
        Ok(rows
            .into_iter()
            .map(|row| {
                let mut row = row.unwrap_or_default();
                row.sort_by(|a, b| server::compare(&a.target_server_item, &b.target_server_item));
                row
            })
            .collect())
    }

    pub fn query_local_versions(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
    ) -> Result<Vec<Vec<LocalVersion>>, VcError> {
        self.require_service_level(ServiceLevel::Tfs2010, "local version queries")?;
        self.playback_queued_edits(workspace, owner, &[]);

        let rows = self
            .transports()
            .repository
            .query_local_versions(workspace, owner, items)
            .map_err(map_fault)?;
        Ok(match rows {
            Some(rows) => rows.into_iter().map(Option::unwrap_or_default).collect(),
            None => items.iter().map(|_| Vec::new()).collect(),
        })
    }

    /// All pending changes of a workspace in one page.
    pub fn query_pending_changes_for_workspace(
        &self,
        workspace: &str,
        owner: &str,
        items: &[ItemSpec],
        download_urls: bool,
        include_merge_info: bool,
        property_filters: &[String],
    ) -> Result<PendingChangesOutcome, VcError> {
        if !property_filters.is_empty() {
            self.require_service_level(ServiceLevel::Tfs2012Update2, "item property filters")?;
        }
        self.playback_queued_edits(workspace, owner, &[]);

        let t = self.transports();
        Ladder::new("query_pending_changes_for_workspace")
            .rung(ServiceLevel::Tfs2012Update2, || {
                t.repository4()?
                    .query_pending_changes_for_workspace(
                        workspace,
                        owner,
                        items,
                        download_urls,
                        i32::MAX,
                        None,
                        include_merge_info,
                        Some(property_filters),
                    )
                    .map(PendingChangesOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2010, || {
                t.extensions()?
                    .query_pending_changes_for_workspace(
                        workspace,
                        owner,
                        items,
                        download_urls,
                        i32::MAX,
                        None,
                        include_merge_info,
                    )
                    .map(PendingChangesOutcome::from)
                    .map_err(map_fault)
            })
            .run(self.service_level())
    }

    /// Pending sets matching `items`, optionally scoped to a workspace.
    ///
    /// `property_filters` is optional on purpose: `None` and an empty
    /// slice both mean "no filters", but only `Some` non-empty filters
    /// force the newer generation on an older server.
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
        let has_filters = property_filters.is_some_and(|f| !f.is_empty());
        if has_filters {
            self.require_service_level(ServiceLevel::Tfs2012Update2, "item property filters")?;
        }
        if let (Some(name), Some(owner)) = (local_workspace, local_owner) {
            self.playback_queued_edits(name, owner, &[]);
        }
        if let (Some(name), Some(owner)) = (workspace, owner) {
            self.playback_queued_edits(name, owner, &[]);
        }

        let t = self.transports();
        Ladder::new("query_pending_sets")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                t.repository5()?
                    .query_pending_sets(
                        local_workspace,
                        local_owner,
                        workspace,
                        owner,
                        items,
                        download_urls,
                        property_filters,
                        MAX_PATH,
                    )
                    .map(PendingSetsOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2012Update2, || {
                t.repository4()?
                    .query_pending_sets(
                        local_workspace,
                        local_owner,
                        workspace,
                        owner,
                        items,
                        download_urls,
                        property_filters,
                    )
                    .map(PendingSetsOutcome::from)
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::PreTfs2010, || {
                t.repository
                    .query_pending_sets(local_workspace, local_owner, workspace, owner, items, download_urls)
                    .map(PendingSetsOutcome::from)
                    .map_err(map_fault)
            })
            .run(self.service_level())
    }

    /// The server's current pending-changes signature for a workspace.
    pub fn query_pending_change_signature(&self, workspace: &str, owner: &str) -> Result<Uuid, VcError> {
        self.require_service_level(ServiceLevel::Tfs2012, "pending change signatures")?;
        self.transports()
            .repository4()?
            .query_pending_change_signature(workspace, owner)
            .map_err(map_fault)
    }

    /// Upload offline work of a local workspace and receive the server's
    /// authoritative pending-change list in return.
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
        self.require_service_level(ServiceLevel::Tfs2012, "local workspace reconcile")?;
        self.playback_queued_edits(workspace, owner, &[]);

        debug!(
            workspace,
            changes = pending_changes.len(),
            updates = local_version_updates.len(),
            "reconciling local workspace"
        );
        let t = self.transports();
        Ladder::new("reconcile_local_workspace")
            .rung(ServiceLevel::Tfs2012Qu1, || {
                t.repository5()?
                    .reconcile_local_workspace(
                        workspace,
                        owner,
                        signature,
                        pending_changes,
                        local_version_updates,
                        clear_local_version_table,
                        throw_on_project_renamed,
                        MAX_PATH,
                    )
                    .map_err(map_fault)
            })
            .rung(ServiceLevel::Tfs2012, || {
                t.repository4()?
                    .reconcile_local_workspace(
                        workspace,
                        owner,
                        signature,
                        pending_changes,
                        local_version_updates,
                        clear_local_version_table,
                    )
                    .map_err(map_fault)
            })
            .run(self.service_level())
    }
}
