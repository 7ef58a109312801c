// Local-workspace strategy.
//
// A LOCAL workspace keeps its pending changes and local versions in
// SQLite tables beside the client. Writes that can be decided from those
// tables never reach the server; everything else reconciles first, takes
// the workspace lock, calls the server and then re-syncs the tables from
// the server's answer.

pub mod access;
pub mod db;
pub mod lock;
mod reconcile;
pub mod tables;
pub mod transaction;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use uuid::Uuid;

use tfvc_common::flags::{
    ChangePendedFlags, CheckinFlags, GetItemsOptions, GetOptions, MergeFlags, PendChangesOptions,
    RollbackOptions, SupportedFeatures,
};
use tfvc_common::path::server;
use tfvc_common::types::{
    is_local_property, ChangeRequest, Changeset, CheckinNotificationInfo, Conflict, ConflictType,
    DeletedState, ExtendedItem, Failure, GetOperation, GetRequest, HistoryQuery, ItemSpec,
    ItemType, LocalVersion, LockLevel, NewConflict, PendingChange, RecursionType, RequestType,
    Shelveset, VersionSpec, WorkingFolder, Workspace, INITIAL_PENDING_CHANGES_SIGNATURE,
};
use tfvc_common::VcError;

use crate::config::workspace_dir;
use crate::dispatch::{
    CheckinOutcome, Dispatcher, MergeOutcome, PendOutcome, PendingChangesOutcome,
    ResolveErrorOptions, ResolveHandler, UnshelveOutcome,
};

use access::LocalAccess;
use db::LocalDb;
use lock::WorkspaceLocks;
use tables::{PendingChangeTable, WorkingFolderTable};
use transaction::TransactionOutcome;

/// File name of the local tables inside a workspace directory.
pub const LOCAL_DB_FILE: &str = "local.db";

pub(crate) fn store_error(error: anyhow::Error) -> VcError {
    VcError::LocalStore(format!("{error:#}"))
}

fn poisoned() -> VcError {
    VcError::LocalStore("local table cache poisoned".into())
}

/// Request types that may be pended from local tables alone.
fn offline_request_type(request_type: RequestType) -> bool {
    matches!(
        request_type,
        RequestType::Add
            | RequestType::Edit
            | RequestType::Delete
            | RequestType::Rename
            | RequestType::Property
    )
}

/// Any lock level other than unchanged needs the server, except `None`
/// on an add.
fn requests_lock(change: &ChangeRequest) -> bool {
    change.lock_level != LockLevel::Unchanged
        && !(change.lock_level == LockLevel::None && change.request_type == RequestType::Add)
}

fn offline_eligible(
    changes: &[ChangeRequest],
    property_filters: &[String],
    attribute_filters: &[String],
) -> bool {
    if !attribute_filters.is_empty() || !property_filters.iter().all(|f| is_local_property(f)) {
        return false;
    }
    changes.iter().all(|change| {
        offline_request_type(change.request_type)
            && !requests_lock(change)
            && (change.request_type == RequestType::Property
                || change.properties.iter().all(|p| is_local_property(&p.name)))
    })
}

/// Whether a get must also reconcile items missing from disk.
fn get_needs_missing_reconcile(workspace: &Workspace, requests: &[GetRequest]) -> bool {
    requests.iter().any(|request| match &request.version {
        None => true,
        Some(VersionSpec::Workspace { name, owner }) => !workspace.matches(name, owner),
        Some(_) => false,
    })
}

#[derive(Debug)]
pub struct LocalWorkspaceStrategy {
    configuration_dir: PathBuf,
    stores: Mutex<HashMap<PathBuf, Arc<Mutex<LocalDb>>>>,
    locks: WorkspaceLocks,
}

impl LocalWorkspaceStrategy {
    pub fn new(configuration_dir: impl Into<PathBuf>) -> Self {
        Self {
            configuration_dir: configuration_dir.into(),
            stores: Mutex::new(HashMap::new()),
            locks: WorkspaceLocks::new(),
        }
    }

    pub fn configuration_dir(&self) -> &Path {
        &self.configuration_dir
    }

    pub fn locks(&self) -> &WorkspaceLocks {
        &self.locks
    }

    // ── Table access ────────────────────────────────────────────────

    /// Open (once) the tables of `workspace`. A fresh database takes its
    /// working folders from the workspace info.
    fn store(&self, workspace: &Workspace) -> Result<Arc<Mutex<LocalDb>>, VcError> {
        let path = workspace_dir(&self.configuration_dir, workspace).join(LOCAL_DB_FILE);
        let mut stores = self.stores.lock().map_err(|_| poisoned())?;
        if let Some(db) = stores.get(&path) {
            return Ok(Arc::clone(db));
        }

        let mut db = LocalDb::open(&path).map_err(store_error)?;
        if !workspace.folders.is_empty() {
            db.transact(|conn| {
                let table = WorkingFolderTable::new(conn);
                if table.list()?.is_empty() {
                    table.replace(&workspace.folders)?;
                    return Ok(TransactionOutcome::Committed(()));
                }
                Ok(TransactionOutcome::Aborted)
            })
            .map_err(store_error)?;
        }
        debug!(workspace = %workspace.name, path = %path.display(), "opened local tables");

        let db = Arc::new(Mutex::new(db));
        stores.insert(path, Arc::clone(&db));
        Ok(db)
    }

    fn with_db<T>(
        &self,
        workspace: &Workspace,
        f: impl FnOnce(&mut LocalDb) -> Result<T, VcError>,
    ) -> Result<T, VcError> {
        let store = self.store(workspace)?;
        let mut db = store.lock().map_err(|_| poisoned())?;
        f(&mut db)
    }

    /// Run `f` over the local tables in one transaction.
    fn access<T>(
        &self,
        workspace: &Workspace,
        f: impl FnOnce(&mut LocalAccess<'_>) -> anyhow::Result<TransactionOutcome<T>>,
    ) -> Result<TransactionOutcome<T>, VcError> {
        self.with_db(workspace, |db| {
            db.transact(|conn| {
                let mut access = LocalAccess::new(conn)?;
                f(&mut access)
            })
            .map_err(store_error)
        })
    }

    fn commit(
        &self,
        workspace: &Workspace,
        f: impl FnOnce(&mut LocalAccess<'_>) -> anyhow::Result<()>,
    ) -> Result<(), VcError> {
        self.access(workspace, |access| {
            f(access)?;
            Ok(TransactionOutcome::Committed(()))
        })
        .map(|_| ())
    }

    /// Mappings as the local tables hold them.
    pub fn working_folders(&self, workspace: &Workspace) -> Result<Vec<WorkingFolder>, VcError> {
        self.with_db(workspace, |db| {
            WorkingFolderTable::new(db.connection())
                .list()
                .map_err(store_error)
        })
    }

    /// The local pending-change table, sorted by server item.
    pub fn pending_changes(&self, workspace: &Workspace) -> Result<Vec<PendingChange>, VcError> {
        self.with_db(workspace, |db| {
            PendingChangeTable::new(db.connection())
                .list()
                .map_err(store_error)
        })
    }

    pub fn client_signature(&self, workspace: &Workspace) -> Result<Uuid, VcError> {
        self.with_db(workspace, |db| {
            tables::PropertiesTable::new(db.connection())
                .get()
                .map(|p| p.client_signature)
                .map_err(store_error)
        })
    }

    // ── Reconcile ───────────────────────────────────────────────────

    /// Reconcile `workspace` with the server. See `reconcile_workspace`.
    pub fn reconcile(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        reconcile_missing: bool,
    ) -> Result<bool, VcError> {
        self.with_db(workspace, |db| {
            reconcile::reconcile_workspace(dispatcher, workspace, db, reconcile_missing)
        })
    }

    fn reconcile_guarded(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        reconcile_missing: bool,
        skip_if_access_denied: bool,
    ) -> Result<(), VcError> {
        match self.reconcile(dispatcher, workspace, reconcile_missing) {
            Ok(_) => Ok(()),
            Err(VcError::AccessDenied(message)) if skip_if_access_denied => {
                warn!(workspace = %workspace.name, error = %message, "reconcile skipped, access denied");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Reconcile the named workspace when it is LOCAL on this machine.
    /// Returns the workspace when it was.
    pub fn reconcile_if_local(
        &self,
        dispatcher: &Dispatcher,
        workspace: &str,
        owner: &str,
        reconcile_missing: bool,
        skip_if_access_denied: bool,
    ) -> Result<Option<Workspace>, VcError> {
        let Some(ws) = dispatcher.workspaces().local_workspace(workspace, owner) else {
            return Ok(None);
        };
        self.reconcile_guarded(dispatcher, &ws, reconcile_missing, skip_if_access_denied)?;
        Ok(Some(ws))
    }

    /// Reconcile the workspace a version spec reads from, when it is local.
    pub fn reconcile_version_spec(
        &self,
        dispatcher: &Dispatcher,
        spec: Option<&VersionSpec>,
    ) -> Result<(), VcError> {
        if let Some(VersionSpec::Workspace { name, owner }) = spec {
            self.reconcile_if_local(dispatcher, name, owner, false, false)?;
        }
        Ok(())
    }

    // ── Re-sync after online calls ──────────────────────────────────

    /// The server's pending changes and signature for `workspace`.
    fn server_pending_changes(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
    ) -> Result<(Vec<PendingChange>, Uuid), VcError> {
        let root = [ItemSpec::new(server::ROOT, RecursionType::Full)];
        let outcome = dispatcher.query_pending_sets(
            Some(&workspace.name),
            Some(&workspace.owner),
            Some(&workspace.name),
            Some(&workspace.owner),
            &root,
            false,
            None,
        )?;
        let (changes, signature) = outcome
            .sets
            .into_iter()
            .find(|set| workspace.matches(&set.name, &set.owner))
            .map(|set| (set.pending_changes, set.signature))
            .unwrap_or((Vec::new(), INITIAL_PENDING_CHANGES_SIGNATURE));
        Ok((changes, signature))
    }

    /// Replace the local pending-change table with the server's view.
    fn sync_pending_changes(&self, dispatcher: &Dispatcher, workspace: &Workspace) -> Result<(), VcError> {
        let (changes, signature) = self.server_pending_changes(dispatcher, workspace)?;
        debug!(workspace = %workspace.name, changes = changes.len(), "pending changes re-synced");
        self.commit(workspace, |access| access.sync_pending_changes(&changes, signature))
    }

    /// Overwrite the local mappings when the server says they changed.
    fn sync_working_folders(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        flags: ChangePendedFlags,
    ) -> Result<(), VcError> {
        if !flags.contains(ChangePendedFlags::WORKING_FOLDER_MAPPINGS_UPDATED) {
            return Ok(());
        }
        let Some(fresh) = dispatcher.query_workspace(&workspace.name, &workspace.owner)? else {
            return Ok(());
        };
        self.commit(workspace, |access| access.set_working_folders(&fresh.folders))?;
        dispatcher
            .workspaces()
            .set_working_folders(&workspace.name, &workspace.owner, fresh.folders);
        Ok(())
    }

    fn after_online_call(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        flags: ChangePendedFlags,
    ) -> Result<(), VcError> {
        self.sync_working_folders(dispatcher, workspace, flags)?;
        self.sync_pending_changes(dispatcher, workspace)
    }

    // ── Writes ──────────────────────────────────────────────────────

    pub fn pend_changes(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        changes: &[ChangeRequest],
        options: PendChangesOptions,
        features: SupportedFeatures,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<PendOutcome, VcError> {
        let first = changes
            .first()
            .ok_or_else(|| VcError::usage("at least one change request is required"))?;
        let request_type = first.request_type;
        if changes.iter().any(|c| c.request_type != request_type) {
            return Err(VcError::usage(
                "all change requests in one call must share a request type",
            ));
        }

        if offline_eligible(changes, property_filters, attribute_filters) {
            let offline = {
                let _lock = self.locks.lock(workspace);
                self.access(workspace, |access| access.pend_changes(changes))?
            };
            match offline {
                TransactionOutcome::Committed(batch) => {
                    debug!(
                        workspace = %workspace.name,
                        operations = batch.operations.len(),
                        failures = batch.failures.len(),
                        "pended offline"
                    );
                    return Ok(PendOutcome::offline(batch.operations, batch.failures));
                }
                TransactionOutcome::Aborted => return Ok(PendOutcome::offline(Vec::new(), Vec::new())),
                TransactionOutcome::RequiresOnline => {
                    debug!(workspace = %workspace.name, ?request_type, "offline pend needs the server");
                }
            }
        }

        let unlock_only = changes
            .iter()
            .all(|c| c.request_type == RequestType::Lock && c.lock_level == LockLevel::None);
        self.reconcile_guarded(dispatcher, workspace, false, unlock_only)?;

        let _lock = self.locks.lock(workspace);
        let outcome = dispatcher.pend_changes_in_local_workspace(
            &workspace.name,
            &workspace.owner,
            changes,
            options,
            features,
            property_filters,
            attribute_filters,
        )?;
        self.after_online_call(dispatcher, workspace, outcome.flags)?;
        if request_type == RequestType::Add {
            self.commit(workspace, |access| access.after_add(&outcome.operations))?;
        }
        Ok(outcome)
    }

    pub fn undo_pending_changes(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        items: &[ItemSpec],
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<PendOutcome, VcError> {
        if property_filters.is_empty() && attribute_filters.is_empty() {
            let offline = {
                let _lock = self.locks.lock(workspace);
                self.access(workspace, |access| access.undo_pending_changes(items))?
            };
            match offline {
                TransactionOutcome::Committed(batch) => {
                    debug!(workspace = %workspace.name, undone = batch.operations.len(), "undone offline");
                    return Ok(PendOutcome::offline(batch.operations, batch.failures));
                }
                TransactionOutcome::Aborted => return Ok(PendOutcome::offline(Vec::new(), Vec::new())),
                TransactionOutcome::RequiresOnline => {
                    debug!(workspace = %workspace.name, "offline undo needs the server");
                }
            }
        }

        self.reconcile(dispatcher, workspace, false)?;
        let _lock = self.locks.lock(workspace);
        let outcome = dispatcher.undo_pending_changes_in_local_workspace(
            &workspace.name,
            &workspace.owner,
            items,
            property_filters,
            attribute_filters,
        )?;
        self.after_online_call(dispatcher, workspace, outcome.flags)?;
        Ok(outcome)
    }

    pub fn add_conflict(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        conflict: &NewConflict,
    ) -> Result<(), VcError> {
        self.reconcile(dispatcher, workspace, false)?;
        let _lock = self.locks.lock(workspace);
        dispatcher.add_conflict(&workspace.name, &workspace.owner, conflict)?;
        if conflict.conflict_type == ConflictType::Merge {
            self.sync_pending_changes(dispatcher, workspace)?;
        }
        Ok(())
    }

    pub fn check_in(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        server_items: &[String],
        changeset: &Changeset,
        info: &CheckinNotificationInfo,
        flags: CheckinFlags,
        defer: bool,
        ticket: i32,
    ) -> Result<CheckinOutcome, VcError> {
        self.reconcile(dispatcher, workspace, false)?;
        let _lock = self.locks.lock(workspace);

        let before = self.pending_changes(workspace)?;

        let outcome = dispatcher.check_in(
            &workspace.name,
            &workspace.owner,
            server_items,
            changeset,
            info,
            flags,
            defer,
            ticket,
        )?;

        let created = outcome.result.changeset;
        if created > 0 {
            // Whatever the server no longer holds as pending was committed.
            let (remaining, signature) = self.server_pending_changes(dispatcher, workspace)?;
            let committed: Vec<PendingChange> = before
                .into_iter()
                .filter(|change| {
                    !remaining
                        .iter()
                        .any(|r| server::equals(&r.server_item, &change.server_item))
                })
                .collect();
            let updates = &outcome.result.local_version_updates;
            self.commit(workspace, |access| {
                access.after_checkin(created, &committed, updates)?;
                access.sync_pending_changes(&remaining, signature)
            })?;
            debug!(
                workspace = %workspace.name,
                changeset = created,
                committed = committed.len(),
                "local versions advanced after check-in"
            );
        } else if created == 0 {
            self.sync_pending_changes(dispatcher, workspace)?;
        }
        Ok(outcome)
    }

    pub fn merge(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        source: &ItemSpec,
        target: &str,
        from: Option<&VersionSpec>,
        to: Option<&VersionSpec>,
        lock_level: LockLevel,
        flags: MergeFlags,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<MergeOutcome, VcError> {
        self.reconcile(dispatcher, workspace, false)?;
        let _lock = self.locks.lock(workspace);
        let outcome = dispatcher.merge(
            &workspace.name,
            &workspace.owner,
            source,
            target,
            from,
            to,
            lock_level,
            flags,
            property_filters,
            attribute_filters,
        )?;
        self.after_online_call(dispatcher, workspace, outcome.flags)?;
        Ok(outcome)
    }

    pub fn rollback(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        items: &[ItemSpec],
        item_version: Option<&VersionSpec>,
        from: Option<&VersionSpec>,
        to: Option<&VersionSpec>,
        options: RollbackOptions,
        lock_level: LockLevel,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<MergeOutcome, VcError> {
        self.reconcile(dispatcher, workspace, false)?;
        let _lock = self.locks.lock(workspace);
        let outcome = dispatcher.rollback(
            &workspace.name,
            &workspace.owner,
            items,
            item_version,
            from,
            to,
            options,
            lock_level,
            property_filters,
            attribute_filters,
        )?;
        self.after_online_call(dispatcher, workspace, outcome.flags)?;
        Ok(outcome)
    }

    pub fn resolve(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        conflicts: &[Conflict],
        property_filters: &[String],
        attribute_filters: &[String],
        error_options: ResolveErrorOptions,
        handler: &mut dyn ResolveHandler,
    ) -> Result<(), VcError> {
        self.reconcile(dispatcher, workspace, false)?;
        let _lock = self.locks.lock(workspace);
        let resolved = dispatcher.resolve(
            &workspace.name,
            &workspace.owner,
            conflicts,
            property_filters,
            attribute_filters,
            error_options,
            handler,
        );
        // Resolutions accepted before a failure still changed pending state.
        self.sync_pending_changes(dispatcher, workspace)?;
        resolved
    }

    pub fn unshelve(
        &self,
        dispatcher: &Dispatcher,
        shelveset_name: &str,
        shelveset_owner: &str,
        workspace: &Workspace,
        items: &[ItemSpec],
        property_filters: &[String],
        attribute_filters: &[String],
        shelveset_property_filters: &[String],
        merge: bool,
    ) -> Result<UnshelveOutcome, VcError> {
        self.reconcile(dispatcher, workspace, false)?;
        let _lock = self.locks.lock(workspace);
        let outcome = dispatcher.unshelve(
            shelveset_name,
            shelveset_owner,
            &workspace.name,
            &workspace.owner,
            items,
            property_filters,
            attribute_filters,
            shelveset_property_filters,
            merge,
        )?;
        self.after_online_call(dispatcher, workspace, outcome.flags)?;
        Ok(outcome)
    }

    pub fn update_workspace(
        &self,
        dispatcher: &Dispatcher,
        old_name: &str,
        workspace: &Workspace,
        replacement: &Workspace,
        features: SupportedFeatures,
    ) -> Result<Workspace, VcError> {
        self.reconcile(dispatcher, workspace, false)?;
        let _lock = self.locks.lock(workspace);
        let updated = dispatcher.update_workspace(old_name, &workspace.owner, replacement, features)?;
        self.commit(workspace, |access| access.set_working_folders(&updated.folders))?;

        let registry = dispatcher.workspaces();
        if !updated.name.eq_ignore_ascii_case(old_name) {
            registry.remove(old_name, &workspace.owner);
        }
        registry.register(updated.clone());
        Ok(updated)
    }

    // ── Reconcile, then the server call ─────────────────────────────

    pub fn check_pending_changes(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        server_items: &[String],
    ) -> Result<Vec<Failure>, VcError> {
        self.reconcile(dispatcher, workspace, false)?;
        dispatcher.check_pending_changes(&workspace.name, &workspace.owner, server_items)
    }

    pub fn get(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        requests: &[GetRequest],
        max_results: i32,
        options: GetOptions,
        no_get: bool,
        property_filters: &[String],
        attribute_filters: &[String],
    ) -> Result<Vec<Vec<GetOperation>>, VcError> {
        let missing = get_needs_missing_reconcile(workspace, requests);
        self.reconcile(dispatcher, workspace, missing)?;
        dispatcher.get(
            &workspace.name,
            &workspace.owner,
            requests,
            max_results,
            options,
            no_get,
            property_filters,
            attribute_filters,
        )
    }

    pub fn query_conflicts(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        items: &[ItemSpec],
    ) -> Result<Vec<Conflict>, VcError> {
        self.reconcile(dispatcher, workspace, false)?;
        dispatcher.query_conflicts(&workspace.name, &workspace.owner, items)
    }

    pub fn query_history(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        query: &HistoryQuery,
    ) -> Result<Vec<Changeset>, VcError> {
        self.reconcile(dispatcher, workspace, false)?;
        dispatcher.query_history(query)
    }

    pub fn shelve(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        server_items: &[String],
        shelveset: &Shelveset,
        replace: bool,
    ) -> Result<Vec<Failure>, VcError> {
        self.reconcile(dispatcher, workspace, false)?;
        dispatcher.shelve(&workspace.name, &workspace.owner, server_items, shelveset, replace)
    }

    pub fn remove_local_conflicts(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        conflicts: &[Conflict],
        error_options: ResolveErrorOptions,
        handler: &mut dyn ResolveHandler,
    ) -> Result<(), VcError> {
        self.reconcile(dispatcher, workspace, false)?;
        dispatcher.remove_local_conflicts(
            &workspace.name,
            &workspace.owner,
            conflicts,
            error_options,
            handler,
        )
    }

    // ── Queries answered locally ────────────────────────────────────

    pub fn query_local_versions(
        &self,
        workspace: &Workspace,
        items: &[ItemSpec],
    ) -> Result<Vec<Vec<LocalVersion>>, VcError> {
        self.with_db(workspace, |db| {
            LocalAccess::new(db.connection())
                .and_then(|access| access.query_local_versions(items))
                .map_err(store_error)
        })
    }

    /// Single-spec queries without merge info, download URLs or property
    /// filters come from the local tables; anything richer asks the server.
    pub fn query_pending_changes_for_workspace(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        items: &[ItemSpec],
        download_urls: bool,
        include_merge_info: bool,
        property_filters: &[String],
    ) -> Result<PendingChangesOutcome, VcError> {
        if let [spec] = items {
            if !download_urls && !include_merge_info && property_filters.is_empty() {
                let changes = self.with_db(workspace, |db| {
                    LocalAccess::new(db.connection())
                        .and_then(|access| access.query_pending_changes(spec))
                        .map_err(store_error)
                })?;
                return Ok(PendingChangesOutcome {
                    changes,
                    failures: Vec::new(),
                });
            }
        }

        self.reconcile(dispatcher, workspace, false)?;
        dispatcher.query_pending_changes_for_workspace(
            &workspace.name,
            &workspace.owner,
            items,
            download_urls,
            include_merge_info,
            property_filters,
        )
    }

    pub fn query_items_extended(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
        items: &[ItemSpec],
        deleted: DeletedState,
        item_type: ItemType,
        options: GetItemsOptions,
        property_filters: &[String],
    ) -> Result<Vec<Vec<ExtendedItem>>, VcError> {
        let local_only = options.contains(GetItemsOptions::LOCAL_ONLY);
        if local_only && property_filters.is_empty() {
            return self.with_db(workspace, |db| {
                LocalAccess::new(db.connection())
                    .and_then(|access| access.query_items_extended(items, deleted, item_type))
                    .map_err(store_error)
            });
        }

        self.reconcile(dispatcher, workspace, false)?;
        let mut rows = dispatcher.query_items_extended(
            Some(&workspace.name),
            Some(&workspace.owner),
            items,
            deleted,
            item_type,
            options,
            property_filters,
        )?;
        if local_only {
            for row in &mut rows {
                row.retain(ExtendedItem::is_local);
            }
        }
        Ok(rows)
    }

    /// The server's copy of the workspace with the local mappings, which
    /// are authoritative for a LOCAL workspace.
    pub fn query_workspace(
        &self,
        dispatcher: &Dispatcher,
        workspace: &Workspace,
    ) -> Result<Option<Workspace>, VcError> {
        let Some(mut found) = dispatcher.query_workspace(&workspace.name, &workspace.owner)? else {
            return Ok(None);
        };
        let folders = self.working_folders(workspace)?;
        if !folders.is_empty() {
            found.folders = folders;
        }
        Ok(Some(found))
    }
}
