// Local-workspace operations over the local tables.
//
// Each pend/undo runs inside one `LocalDb::transact` scope and reports
// `RequiresOnline` as soon as it meets something only the server can
// decide; the caller then rolls back and goes online.

use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use tfvc_common::flags::ChangeType;
use tfvc_common::path::{mapping, server};
use tfvc_common::types::{
    is_local_property, ChangeRequest, DeletedState, ExtendedItem, Failure, GetOperation, ItemSpec,
    ItemType, LocalVersion, PendingChange, PropertyValue, RequestType,
    ServerItemLocalVersionUpdate, WorkingFolder,
};

use super::tables::{
    in_scope, LocalVersionRow, LocalVersionTable, PendingChangeTable, PropertiesTable,
    WorkingFolderTable,
};
use super::transaction::TransactionOutcome;

/// Suffixes tried, in order, when an undone rename needs a pending add moved
/// out of its way.
const ADD_RELOCATION_ATTEMPTS: u32 = 10;

/// Operations and per-item failures of a batch answered from local tables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalBatch {
    pub operations: Vec<GetOperation>,
    pub failures: Vec<Failure>,
}

enum Step {
    Done(GetOperation),
    Failed(Failure),
    Online,
}

fn not_found(server_item: &str) -> Failure {
    Failure::new(
        "ItemNotFound",
        Some(server_item.to_string()),
        "the item is not in the workspace",
    )
}

fn pending_delete(server_item: &str) -> Failure {
    Failure::new(
        "PendingDelete",
        Some(server_item.to_string()),
        "the item has a pending delete",
    )
}

fn merge_properties(existing: &mut Vec<PropertyValue>, updates: &[PropertyValue]) {
    for update in updates {
        match existing
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&update.name))
        {
            Some(current) => current.value = update.value.clone(),
            None => existing.push(update.clone()),
        }
    }
}

fn operation(change: &PendingChange, row: Option<&LocalVersionRow>) -> GetOperation {
    GetOperation {
        item_id: row.map_or(0, |r| r.item_id),
        item_type: change.item_type,
        source_server_item: change.source_server_item.clone(),
        target_server_item: Some(change.server_item.clone()),
        source_local_item: row.and_then(|r| r.local_item.clone()),
        target_local_item: if change.change_type.contains(ChangeType::DELETE) {
            None
        } else {
            change.local_item.clone()
        },
        version_local: row.map_or(0, |r| r.version),
        version_server: row.map_or(0, |r| r.version),
        change_type: change.change_type,
        lock_level: change.lock_level,
        pending_change_id: 0,
    }
}

pub struct LocalAccess<'a> {
    conn: &'a Connection,
    folders: Vec<WorkingFolder>,
}

impl<'a> LocalAccess<'a> {
    pub fn new(conn: &'a Connection) -> Result<Self> {
        let folders = WorkingFolderTable::new(conn).list()?;
        Ok(Self { conn, folders })
    }

    fn versions(&self) -> LocalVersionTable<'a> {
        LocalVersionTable::new(self.conn)
    }

    fn pending(&self) -> PendingChangeTable<'a> {
        PendingChangeTable::new(self.conn)
    }

    fn properties(&self) -> PropertiesTable<'a> {
        PropertiesTable::new(self.conn)
    }

    /// Server and local path of an item given either form.
    fn resolve(&self, item: &str) -> Result<(String, Option<String>), Failure> {
        let unmapped = || {
            Failure::new(
                "ItemNotMapped",
                Some(item.to_string()),
                "no working folder maps this item",
            )
        };
        if server::is_server_path(item) {
            let server_item = server::canonicalize(item)
                .map_err(|e| Failure::new("InvalidPath", Some(item.to_string()), e.to_string()))?;
            let local_item = mapping::server_to_local(&self.folders, &server_item);
            if local_item.is_none() {
                return Err(unmapped());
            }
            Ok((server_item, local_item))
        } else {
            let server_item = mapping::local_to_server(&self.folders, item).ok_or_else(unmapped)?;
            Ok((server_item, Some(item.to_string())))
        }
    }

    fn live_row(&self, server_item: &str) -> Result<Option<LocalVersionRow>> {
        Ok(self.versions().get(server_item)?.filter(|row| !row.deleted))
    }

    fn touch_signature(&self) -> Result<Uuid> {
        let empty = self.pending().count()? == 0;
        self.properties().regenerate_client_signature(empty)
    }

    // ── Pend ────────────────────────────────────────────────────────

    /// Pend a homogeneous batch offline.
    pub fn pend_changes(&self, changes: &[ChangeRequest]) -> Result<TransactionOutcome<LocalBatch>> {
        let mut batch = LocalBatch::default();
        for change in changes {
            let step = match change.request_type {
                RequestType::Add => self.pend_add(change)?,
                RequestType::Edit => self.pend_edit(change)?,
                RequestType::Delete => self.pend_delete(change)?,
                RequestType::Rename => self.pend_rename(change)?,
                RequestType::Property => self.pend_property_change(change)?,
                other => {
                    debug!(request_type = ?other, "request type has no offline form");
                    Step::Online
                }
            };
            match step {
                Step::Done(op) => batch.operations.push(op),
                Step::Failed(failure) => batch.failures.push(failure),
                Step::Online => return Ok(TransactionOutcome::RequiresOnline),
            }
        }
        if !batch.operations.is_empty() {
            self.touch_signature()?;
        }
        Ok(TransactionOutcome::Committed(batch))
    }

    fn pend_add(&self, change: &ChangeRequest) -> Result<Step> {
        let (server_item, local_item) = match self.resolve(&change.item.item) {
            Ok(paths) => paths,
            Err(failure) => return Ok(Step::Failed(failure)),
        };
        if let Some(existing) = self.pending().get(&server_item)? {
            if existing.change_type.contains(ChangeType::DELETE) {
                debug!(item = %server_item, "add over a pending delete");
                return Ok(Step::Online);
            }
            return Ok(Step::Failed(Failure::new(
                "ChangeAlreadyPending",
                Some(server_item),
                "a change is already pending on this item",
            )));
        }
        if self.live_row(&server_item)?.is_some() {
            return Ok(Step::Failed(Failure::new(
                "ItemExists",
                Some(server_item),
                "the item already exists in the workspace",
            )));
        }

        let mut pended = PendingChange::new(&server_item, ChangeType::ADD);
        pended.local_item = local_item;
        pended.item_type = match change.item_type {
            ItemType::Any => ItemType::File,
            other => other,
        };
        pended.encoding = change.encoding;
        if !change.properties.is_empty() {
            pended.change_type |= ChangeType::PROPERTY;
            pended.properties = change.properties.clone();
        }
        self.pending().upsert(&pended)?;
        Ok(Step::Done(operation(&pended, None)))
    }

    fn pend_edit(&self, change: &ChangeRequest) -> Result<Step> {
        let (server_item, local_item) = match self.resolve(&change.item.item) {
            Ok(paths) => paths,
            Err(failure) => return Ok(Step::Failed(failure)),
        };
        let existing = self.pending().get(&server_item)?;
        if let Some(pended) = &existing {
            if pended.change_type.contains(ChangeType::DELETE) {
                return Ok(Step::Failed(pending_delete(&server_item)));
            }
            if pended.change_type.contains(ChangeType::ADD) {
                return Ok(Step::Done(operation(pended, None)));
            }
        }
        let Some(row) = self.live_row(&server_item)? else {
            return Ok(Step::Failed(not_found(&server_item)));
        };
        if row.item_type == ItemType::Folder {
            return Ok(Step::Failed(Failure::new(
                "NotAFile",
                Some(server_item),
                "folders cannot be edited",
            )));
        }

        let mut pended = existing.unwrap_or_else(|| PendingChange {
            local_item: row.local_item.clone().or(local_item),
            item_type: row.item_type,
            version: row.version,
            ..PendingChange::new(&server_item, ChangeType::NONE)
        });
        pended.change_type |= ChangeType::EDIT;
        if change.encoding != -2 && change.encoding != pended.encoding {
            pended.encoding = change.encoding;
            pended.change_type |= ChangeType::ENCODING;
        }
        self.pending().upsert(&pended)?;
        Ok(Step::Done(operation(&pended, Some(&row))))
    }

    fn pend_delete(&self, change: &ChangeRequest) -> Result<Step> {
        let (server_item, _) = match self.resolve(&change.item.item) {
            Ok(paths) => paths,
            Err(failure) => return Ok(Step::Failed(failure)),
        };
        let existing = self.pending().get(&server_item)?;
        if let Some(pended) = &existing {
            if pended.change_type.contains(ChangeType::ADD) {
                // Deleting a pending add simply drops it.
                self.pending().remove(&server_item)?;
                return Ok(Step::Done(GetOperation {
                    item_type: pended.item_type,
                    target_server_item: Some(server_item),
                    source_local_item: pended.local_item.clone(),
                    target_local_item: None,
                    change_type: ChangeType::DELETE,
                    ..GetOperation::default()
                }));
            }
            if pended.change_type.contains(ChangeType::DELETE) {
                return Ok(Step::Failed(Failure::new(
                    "ChangeAlreadyPending",
                    Some(server_item),
                    "a delete is already pending on this item",
                )));
            }
        }
        let Some(row) = self.live_row(&server_item)? else {
            return Ok(Step::Failed(not_found(&server_item)));
        };

        let mut pended = existing.unwrap_or_else(|| PendingChange {
            local_item: row.local_item.clone(),
            item_type: row.item_type,
            version: row.version,
            ..PendingChange::new(&server_item, ChangeType::NONE)
        });
        pended.change_type = (pended.change_type - ChangeType::EDIT - ChangeType::ENCODING)
            | ChangeType::DELETE;
        self.pending().upsert(&pended)?;
        Ok(Step::Done(operation(&pended, Some(&row))))
    }

    fn pend_rename(&self, change: &ChangeRequest) -> Result<Step> {
        let Some(target) = change.target_item.as_deref() else {
            return Ok(Step::Failed(Failure::new(
                "TargetRequired",
                Some(change.item.item.clone()),
                "a rename needs a target item",
            )));
        };
        let (source_item, source_local) = match self.resolve(&change.item.item) {
            Ok(paths) => paths,
            Err(failure) => return Ok(Step::Failed(failure)),
        };
        if server::is_team_project_root(&source_item) {
            debug!(item = %source_item, "team project rename");
            return Ok(Step::Online);
        }
        let (target_item, target_local) = match self.resolve(target) {
            Ok(paths) => paths,
            Err(failure) => return Ok(Step::Failed(failure)),
        };
        if server::is_team_project_root(&target_item) {
            debug!(item = %target_item, "rename onto a team project root");
            return Ok(Step::Online);
        }
        if source_item == target_item {
            return Ok(Step::Failed(Failure::new(
                "SameItem",
                Some(source_item),
                "source and target are the same item",
            )));
        }
        if !server::equals(&source_item, &target_item)
            && (self.pending().get(&target_item)?.is_some() || self.live_row(&target_item)?.is_some())
        {
            return Ok(Step::Failed(Failure::new(
                "TargetExists",
                Some(target_item),
                "an item already exists at the rename target",
            )));
        }

        let existing = self.pending().get(&source_item)?;
        if let Some(pended) = &existing {
            if pended.change_type.contains(ChangeType::DELETE) {
                return Ok(Step::Failed(pending_delete(&source_item)));
            }
            if pended.change_type.contains(ChangeType::ADD) {
                self.pending()
                    .relocate(&source_item, &target_item, None, &self.folders)?;
                return Ok(Step::Done(GetOperation {
                    item_type: pended.item_type,
                    target_server_item: Some(target_item),
                    source_local_item: pended.local_item.clone().or(source_local),
                    target_local_item: target_local,
                    change_type: pended.change_type,
                    ..GetOperation::default()
                }));
            }
        }
        let Some(row) = self.live_row(&source_item)? else {
            return Ok(Step::Failed(not_found(&source_item)));
        };

        let committed = existing
            .as_ref()
            .map(|p| p.committed_server_item().to_string())
            .unwrap_or_else(|| source_item.clone());
        self.pending()
            .relocate(&source_item, &target_item, Some(&source_item), &self.folders)?;
        if existing.is_some() {
            self.pending().remove(&source_item)?;
        }
        self.versions().relocate(&source_item, &target_item, &self.folders)?;

        let mut pended = existing.unwrap_or_else(|| PendingChange {
            item_type: row.item_type,
            version: row.version,
            ..PendingChange::new(&source_item, ChangeType::NONE)
        });
        pended.server_item = target_item.clone();
        pended.local_item = target_local;
        if committed == target_item {
            // Renamed back to where it is committed.
            pended.source_server_item = None;
            pended.change_type -= ChangeType::RENAME;
        } else {
            pended.source_server_item = Some(committed);
            pended.change_type |= ChangeType::RENAME;
        }
        if !pended.change_type.is_empty() {
            self.pending().upsert(&pended)?;
        }
        Ok(Step::Done(operation(&pended, Some(&row))))
    }

    fn pend_property_change(&self, change: &ChangeRequest) -> Result<Step> {
        if change.properties.iter().any(|p| !is_local_property(&p.name)) {
            debug!("property change needs the server");
            return Ok(Step::Online);
        }
        let (server_item, local_item) = match self.resolve(&change.item.item) {
            Ok(paths) => paths,
            Err(failure) => return Ok(Step::Failed(failure)),
        };
        let existing = self.pending().get(&server_item)?;
        if let Some(pended) = &existing {
            if pended.change_type.contains(ChangeType::DELETE) {
                return Ok(Step::Failed(pending_delete(&server_item)));
            }
            if pended.change_type.contains(ChangeType::ADD) {
                let mut pended = pended.clone();
                merge_properties(&mut pended.properties, &change.properties);
                pended.change_type |= ChangeType::PROPERTY;
                self.pending().upsert(&pended)?;
                return Ok(Step::Done(operation(&pended, None)));
            }
        }
        let Some(row) = self.live_row(&server_item)? else {
            debug!(item = %server_item, "property change on an item the local tables do not know");
            return Ok(Step::Online);
        };

        let mut pended = existing.unwrap_or_else(|| PendingChange {
            local_item: row.local_item.clone().or(local_item),
            item_type: row.item_type,
            version: row.version,
            ..PendingChange::new(&server_item, ChangeType::NONE)
        });
        merge_properties(&mut pended.properties, &change.properties);
        pended.change_type |= ChangeType::PROPERTY;
        self.pending().upsert(&pended)?;
        Ok(Step::Done(operation(&pended, Some(&row))))
    }

    // ── Undo ────────────────────────────────────────────────────────

    pub fn undo_pending_changes(&self, items: &[ItemSpec]) -> Result<TransactionOutcome<LocalBatch>> {
        let all = self.pending().list()?;
        let mut batch = LocalBatch::default();
        let mut targets: Vec<PendingChange> = Vec::new();

        for spec in items {
            let scope = match self.resolve(&spec.item) {
                Ok((server_item, _)) => server_item,
                Err(failure) => {
                    batch.failures.push(failure);
                    continue;
                }
            };
            let before = targets.len();
            for change in all.iter().filter(|c| in_scope(&scope, spec.recursion, &c.server_item)) {
                if !targets
                    .iter()
                    .any(|t| server::equals(&t.server_item, &change.server_item))
                {
                    targets.push(change.clone());
                }
            }
            if targets.len() == before
                && !all.iter().any(|c| in_scope(&scope, spec.recursion, &c.server_item))
            {
                batch.failures.push(Failure::new(
                    "NoPendingChanges",
                    Some(scope),
                    "no pending changes match",
                ));
            }
        }

        if targets.iter().any(|c| {
            c.change_type
                .intersects(ChangeType::MERGE | ChangeType::BRANCH | ChangeType::UNDELETE)
        }) {
            debug!("undo of merge, branch or undelete needs the server");
            return Ok(TransactionOutcome::RequiresOnline);
        }

        // Plain undos first, then renames deepest first, so a rename never
        // lands on a row that is itself being undone.
        let (mut renames, plain): (Vec<_>, Vec<_>) = targets
            .into_iter()
            .partition(|c| c.change_type.contains(ChangeType::RENAME));
        renames.sort_by_key(|c| std::cmp::Reverse(server::depth(&c.server_item)));

        for change in &plain {
            let row = self.versions().get(&change.server_item)?;
            self.pending().remove(&change.server_item)?;
            batch.operations.push(GetOperation {
                source_local_item: if change.change_type.contains(ChangeType::DELETE) {
                    None
                } else {
                    change.local_item.clone()
                },
                target_local_item: change
                    .local_item
                    .clone()
                    .or_else(|| row.as_ref().and_then(|r| r.local_item.clone())),
                ..operation(change, row.as_ref())
            });
        }
        for change in &renames {
            if !self.undo_rename(change, &mut batch.operations)? {
                return Ok(TransactionOutcome::RequiresOnline);
            }
        }

        if !batch.operations.is_empty() {
            self.touch_signature()?;
        }
        Ok(TransactionOutcome::Committed(batch))
    }

    /// Move a renamed item back to its committed path. `false` when the
    /// committed path is taken and cannot be freed locally.
    fn undo_rename(&self, change: &PendingChange, operations: &mut Vec<GetOperation>) -> Result<bool> {
        let committed = change.committed_server_item().to_string();
        if let Some(blocker) = self.pending().get(&committed)? {
            if !blocker.change_type.contains(ChangeType::ADD) {
                debug!(item = %committed, "undo target holds another pending change");
                return Ok(false);
            }
            let Some(moved_to) = self.free_add_location(&committed)? else {
                debug!(item = %committed, "no free location for the blocking add");
                return Ok(false);
            };
            self.pending()
                .relocate(&committed, &moved_to, None, &self.folders)?;
            operations.push(GetOperation {
                item_type: blocker.item_type,
                target_server_item: Some(moved_to.clone()),
                source_local_item: blocker.local_item.clone(),
                target_local_item: mapping::server_to_local(&self.folders, &moved_to),
                change_type: blocker.change_type,
                ..GetOperation::default()
            });
        } else if change.item_type != ItemType::Folder && self.untracked_on_disk(&committed)? {
            debug!(item = %committed, "untracked file at the undo target");
            return Ok(false);
        }

        self.pending().remove(&change.server_item)?;
        self.pending()
            .relocate(&change.server_item, &committed, None, &self.folders)?;
        self.versions()
            .relocate(&change.server_item, &committed, &self.folders)?;
        let row = self.versions().get(&committed)?;

        operations.push(GetOperation {
            item_id: row.as_ref().map_or(0, |r| r.item_id),
            item_type: change.item_type,
            source_server_item: Some(change.server_item.clone()),
            target_server_item: Some(committed.clone()),
            source_local_item: change.local_item.clone(),
            target_local_item: mapping::server_to_local(&self.folders, &committed),
            version_local: row.as_ref().map_or(0, |r| r.version),
            version_server: row.as_ref().map_or(0, |r| r.version),
            change_type: change.change_type,
            lock_level: change.lock_level,
            pending_change_id: 0,
        });
        Ok(true)
    }

    /// First of `<item>.add`, `<item>.add1` … `<item>.add10` that is free.
    fn free_add_location(&self, item: &str) -> Result<Option<String>> {
        for attempt in 0..=ADD_RELOCATION_ATTEMPTS {
            let candidate = if attempt == 0 {
                format!("{item}.add")
            } else {
                format!("{item}.add{attempt}")
            };
            if self.pending().get(&candidate)?.is_none()
                && self.versions().get(&candidate)?.is_none()
                && !self.exists_on_disk(&candidate)
            {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    fn exists_on_disk(&self, server_item: &str) -> bool {
        mapping::server_to_local(&self.folders, server_item)
            .is_some_and(|local_item| Path::new(&local_item).exists())
    }

    /// A file sits at the local path of `server_item` that no live local
    /// version row accounts for.
    fn untracked_on_disk(&self, server_item: &str) -> Result<bool> {
        if !self.exists_on_disk(server_item) {
            return Ok(false);
        }
        Ok(self.live_row(server_item)?.is_none())
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn query_local_versions(&self, items: &[ItemSpec]) -> Result<Vec<Vec<LocalVersion>>> {
        let rows = self.versions().list()?;
        Ok(items
            .iter()
            .map(|spec| match self.resolve(&spec.item) {
                Ok((scope, _)) => rows
                    .iter()
                    .filter(|row| !row.deleted && in_scope(&scope, spec.recursion, &row.server_item))
                    .filter_map(|row| {
                        row.local_item.clone().map(|local_item| LocalVersion {
                            local_item,
                            version: row.version,
                        })
                    })
                    .collect(),
                Err(_) => Vec::new(),
            })
            .collect())
    }

    pub fn query_pending_changes(&self, spec: &ItemSpec) -> Result<Vec<PendingChange>> {
        let Ok((scope, _)) = self.resolve(&spec.item) else {
            return Ok(Vec::new());
        };
        Ok(self
            .pending()
            .list()?
            .into_iter()
            .filter(|c| in_scope(&scope, spec.recursion, &c.server_item))
            .collect())
    }

    /// Version rows and pending adds under each spec, sorted by server item.
    pub fn query_items_extended(
        &self,
        items: &[ItemSpec],
        deleted_state: DeletedState,
        item_type: ItemType,
    ) -> Result<Vec<Vec<ExtendedItem>>> {
        let rows = self.versions().list()?;
        let pending = self.pending().list()?;
        let pending_for = |item: &str| pending.iter().find(|c| server::equals(&c.server_item, item));

        let type_matches = |t: ItemType| item_type == ItemType::Any || item_type == t;
        let deletion_matches = |deleted: bool| match deleted_state {
            DeletedState::NonDeleted => !deleted,
            DeletedState::Deleted => deleted,
            DeletedState::Any => true,
        };

        Ok(items
            .iter()
            .map(|spec| {
                let Ok((scope, _)) = self.resolve(&spec.item) else {
                    return Vec::new();
                };
                let mut found: Vec<ExtendedItem> = rows
                    .iter()
                    .filter(|row| in_scope(&scope, spec.recursion, &row.server_item))
                    .filter(|row| type_matches(row.item_type) && deletion_matches(row.deleted))
                    .map(|row| {
                        let change = pending_for(&row.server_item);
                        ExtendedItem {
                            target_server_item: row.server_item.clone(),
                            source_server_item: change.and_then(|c| c.source_server_item.clone()),
                            local_item: row.local_item.clone(),
                            item_id: row.item_id,
                            item_type: row.item_type,
                            version_local: row.version,
                            version_latest: row.version,
                            deletion_id: 0,
                            change_type: change.map_or(ChangeType::NONE, |c| c.change_type),
                        }
                    })
                    .collect();
                if deletion_matches(false) {
                    found.extend(
                        pending
                            .iter()
                            .filter(|c| c.change_type.contains(ChangeType::ADD))
                            .filter(|c| in_scope(&scope, spec.recursion, &c.server_item))
                            .filter(|c| type_matches(c.item_type))
                            .map(|c| ExtendedItem {
                                target_server_item: c.server_item.clone(),
                                source_server_item: None,
                                local_item: c.local_item.clone(),
                                item_id: 0,
                                item_type: c.item_type,
                                version_local: 0,
                                version_latest: 0,
                                deletion_id: 0,
                                change_type: c.change_type,
                            }),
                    );
                }
                found.sort_by(|a, b| server::compare(&a.target_server_item, &b.target_server_item));
                found
            })
            .collect())
    }

    pub fn query_working_folders(&self) -> &[WorkingFolder] {
        &self.folders
    }

    pub fn set_working_folders(&mut self, folders: &[WorkingFolder]) -> Result<()> {
        WorkingFolderTable::new(self.conn).replace(folders)?;
        self.folders = folders.to_vec();
        Ok(())
    }

    // ── Follow-ups of server calls ──────────────────────────────────

    /// Mirror the version rows the server created for pended adds.
    pub fn after_add(&self, operations: &[GetOperation]) -> Result<()> {
        for op in operations.iter().filter(|op| op.change_type.contains(ChangeType::ADD)) {
            let Some(server_item) = &op.target_server_item else {
                continue;
            };
            self.versions().upsert(&LocalVersionRow {
                server_item: server_item.clone(),
                local_item: op.target_local_item.clone(),
                item_id: op.item_id,
                item_type: op.item_type,
                version: 0,
                pending_reconcile: false,
                deleted: false,
            })?;
        }
        Ok(())
    }

    /// Fold committed changes into the version table.
    pub fn after_checkin(
        &self,
        changeset: i32,
        committed: &[PendingChange],
        updates: &[ServerItemLocalVersionUpdate],
    ) -> Result<()> {
        let versions = self.versions();
        for change in committed {
            if change.change_type.contains(ChangeType::DELETE) {
                versions.remove(&change.server_item)?;
                versions.remove(change.committed_server_item())?;
                continue;
            }
            let previous = versions
                .get(&change.server_item)?
                .or(versions.get(change.committed_server_item())?);
            if !server::equals(change.committed_server_item(), &change.server_item) {
                versions.remove(change.committed_server_item())?;
            }
            versions.upsert(&LocalVersionRow {
                server_item: change.server_item.clone(),
                local_item: change.local_item.clone(),
                item_id: previous.as_ref().map_or(0, |r| r.item_id),
                item_type: change.item_type,
                version: changeset,
                pending_reconcile: false,
                deleted: false,
            })?;
        }
        for update in updates {
            self.apply_local_version_update(update)?;
        }
        Ok(())
    }

    pub fn apply_local_version_update(&self, update: &ServerItemLocalVersionUpdate) -> Result<()> {
        let versions = self.versions();
        match &update.target_local_item {
            None => {
                versions.remove(&update.source_server_item)?;
            }
            Some(local_item) => {
                let item_type = versions
                    .get(&update.source_server_item)?
                    .map_or(ItemType::File, |r| r.item_type);
                versions.upsert(&LocalVersionRow {
                    server_item: update.source_server_item.clone(),
                    local_item: Some(local_item.clone()),
                    item_id: update.item_id,
                    item_type,
                    version: update.local_version,
                    pending_reconcile: false,
                    deleted: false,
                })?;
            }
        }
        Ok(())
    }

    /// Replace the pending-change table with the server's list and adopt its
    /// signature as both client and base.
    pub fn sync_pending_changes(&self, changes: &[PendingChange], signature: Uuid) -> Result<()> {
        self.pending().replace_all(changes)?;
        self.properties().acknowledge(signature)
    }

    /// Updates the server has not yet seen, one per row awaiting reconcile.
    pub fn pending_local_version_updates(&self) -> Result<Vec<ServerItemLocalVersionUpdate>> {
        Ok(self
            .versions()
            .pending_reconcile()?
            .into_iter()
            .map(|row| ServerItemLocalVersionUpdate {
                source_server_item: row.server_item,
                item_id: row.item_id,
                target_local_item: if row.deleted { None } else { row.local_item },
                local_version: row.version,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::db::LocalDb;
    use tfvc_common::types::{RecursionType, EXECUTABLE_PROPERTY, INITIAL_PENDING_CHANGES_SIGNATURE};

    fn seeded() -> LocalDb {
        let mut db = LocalDb::open_in_memory().unwrap();
        db.transact(|conn| {
            let mut access = LocalAccess::new(conn)?;
            access.set_working_folders(&[WorkingFolder::mapped("$/P", "/ws")])?;
            let versions = LocalVersionTable::new(conn);
            versions.upsert(&LocalVersionRow::new("$/P/a.txt", "/ws/a.txt", 5))?;
            versions.upsert(&LocalVersionRow {
                item_type: ItemType::Folder,
                ..LocalVersionRow::new("$/P/dir", "/ws/dir", 5)
            })?;
            versions.upsert(&LocalVersionRow::new("$/P/dir/b.txt", "/ws/dir/b.txt", 5))?;
            Ok(TransactionOutcome::Committed(()))
        })
        .unwrap();
        db
    }

    fn run<T>(db: &mut LocalDb, f: impl FnOnce(&LocalAccess<'_>) -> Result<TransactionOutcome<T>>) -> TransactionOutcome<T> {
        db.transact(|conn| f(&LocalAccess::new(conn)?)).unwrap()
    }

    fn pending(db: &LocalDb) -> Vec<PendingChange> {
        PendingChangeTable::new(db.connection()).list().unwrap()
    }

    #[test]
    fn add_by_local_path_records_pending_add() {
        let mut db = seeded();
        let outcome = run(&mut db, |a| a.pend_changes(&[ChangeRequest::add("/ws/new.txt")]));
        let batch = outcome.committed().unwrap();
        assert_eq!(batch.operations.len(), 1);
        assert_eq!(batch.operations[0].target_server_item.as_deref(), Some("$/P/new.txt"));

        let changes = pending(&db);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::ADD);
        assert_ne!(
            PropertiesTable::new(db.connection()).get().unwrap().client_signature,
            INITIAL_PENDING_CHANGES_SIGNATURE
        );
    }

    #[test]
    fn unmapped_items_fail_without_aborting_the_batch() {
        let mut db = seeded();
        let batch = run(&mut db, |a| {
            a.pend_changes(&[ChangeRequest::edit("/elsewhere/x.txt"), ChangeRequest::edit("$/P/a.txt")])
        })
        .committed()
        .unwrap();
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].code, "ItemNotMapped");
        assert_eq!(batch.operations.len(), 1);
        assert_eq!(batch.operations[0].version_local, 5);
    }

    #[test]
    fn edit_on_unknown_item_is_a_failure() {
        let mut db = seeded();
        let batch = run(&mut db, |a| a.pend_changes(&[ChangeRequest::edit("$/P/missing.txt")]))
            .committed()
            .unwrap();
        assert_eq!(batch.failures[0].code, "ItemNotFound");
        assert!(pending(&db).is_empty());
    }

    #[test]
    fn delete_supersedes_edit() {
        let mut db = seeded();
        run(&mut db, |a| a.pend_changes(&[ChangeRequest::edit("$/P/a.txt")]));
        run(&mut db, |a| a.pend_changes(&[ChangeRequest::delete("$/P/a.txt")]));
        assert_eq!(pending(&db)[0].change_type, ChangeType::DELETE);
    }

    #[test]
    fn rename_moves_version_rows_and_marks_reconcile() {
        let mut db = seeded();
        let batch = run(&mut db, |a| a.pend_changes(&[ChangeRequest::rename("$/P/dir", "$/P/moved")]))
            .committed()
            .unwrap();
        assert_eq!(batch.operations[0].target_local_item.as_deref(), Some("/ws/moved"));

        let versions = LocalVersionTable::new(db.connection());
        let child = versions.get("$/P/moved/b.txt").unwrap().unwrap();
        assert!(child.pending_reconcile);
        assert!(versions.get("$/P/dir").unwrap().is_none());

        let changes = pending(&db);
        assert_eq!(changes[0].server_item, "$/P/moved");
        assert_eq!(changes[0].source_server_item.as_deref(), Some("$/P/dir"));
    }

    #[test]
    fn team_project_rename_requires_online_and_rolls_back() {
        let mut db = seeded();
        let outcome = run(&mut db, |a| {
            a.pend_changes(&[ChangeRequest::edit("$/P/a.txt"), ChangeRequest::rename("$/P", "$/Q")])
        });
        assert_eq!(outcome, TransactionOutcome::RequiresOnline);
        assert!(pending(&db).is_empty());
    }

    #[test]
    fn property_changes_stay_local_only_for_known_keys() {
        let mut db = seeded();
        let mut exec = ChangeRequest::new(ItemSpec::new("$/P/a.txt", RecursionType::None), RequestType::Property);
        exec.properties = vec![PropertyValue::new(EXECUTABLE_PROPERTY, Some("true".into()))];
        assert!(run(&mut db, |a| a.pend_changes(&[exec.clone()])).is_committed());
        assert_eq!(pending(&db)[0].change_type, ChangeType::PROPERTY);

        let mut custom = exec.clone();
        custom.properties = vec![PropertyValue::new("Custom.Owner", Some("bob".into()))];
        assert_eq!(run(&mut db, |a| a.pend_changes(&[custom])), TransactionOutcome::RequiresOnline);

        let mut unknown = exec;
        unknown.item = ItemSpec::new("$/P/unknown.sh", RecursionType::None);
        assert_eq!(run(&mut db, |a| a.pend_changes(&[unknown])), TransactionOutcome::RequiresOnline);
    }

    #[test]
    fn undo_of_last_change_restores_initial_signature() {
        let mut db = seeded();
        run(&mut db, |a| a.pend_changes(&[ChangeRequest::edit("$/P/a.txt")]));
        let props = PropertiesTable::new(db.connection());
        props.acknowledge(props.get().unwrap().client_signature).unwrap();

        let batch = run(&mut db, |a| {
            a.undo_pending_changes(&[ItemSpec::new("$/P/a.txt", RecursionType::None)])
        })
        .committed()
        .unwrap();
        assert_eq!(batch.operations.len(), 1);
        assert!(pending(&db).is_empty());
        assert_eq!(
            PropertiesTable::new(db.connection()).get().unwrap().client_signature,
            INITIAL_PENDING_CHANGES_SIGNATURE
        );
    }

    #[test]
    fn undo_of_merge_requires_online() {
        let mut db = seeded();
        let mut merged = PendingChange::new("$/P/a.txt", ChangeType::MERGE | ChangeType::EDIT);
        merged.local_item = Some("/ws/a.txt".into());
        PendingChangeTable::new(db.connection()).upsert(&merged).unwrap();

        let outcome = run(&mut db, |a| {
            a.undo_pending_changes(&[ItemSpec::new("$/P", RecursionType::Full)])
        });
        assert_eq!(outcome, TransactionOutcome::RequiresOnline);
        assert_eq!(pending(&db).len(), 1);
    }

    #[test]
    fn undo_rename_relocates_blocking_add() {
        let mut db = seeded();
        run(&mut db, |a| a.pend_changes(&[ChangeRequest::rename("$/P/a.txt", "$/P/b.txt")]));
        run(&mut db, |a| a.pend_changes(&[ChangeRequest::add("$/P/a.txt")]));

        let batch = run(&mut db, |a| {
            a.undo_pending_changes(&[ItemSpec::new("$/P/b.txt", RecursionType::None)])
        })
        .committed()
        .unwrap();
        assert_eq!(batch.operations.len(), 2);

        let changes = pending(&db);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].server_item, "$/P/a.txt.add");
        assert_eq!(changes[0].change_type, ChangeType::ADD);
        let versions = LocalVersionTable::new(db.connection());
        assert!(versions.get("$/P/a.txt").unwrap().is_some());
    }

    #[test]
    fn undo_rename_without_free_location_requires_online() {
        let mut db = seeded();
        run(&mut db, |a| a.pend_changes(&[ChangeRequest::rename("$/P/a.txt", "$/P/b.txt")]));
        run(&mut db, |a| a.pend_changes(&[ChangeRequest::add("$/P/a.txt")]));
        {
            let table = PendingChangeTable::new(db.connection());
            let mut taken = vec!["$/P/a.txt.add".to_string()];
            taken.extend((1..=10).map(|i| format!("$/P/a.txt.add{i}")));
            for item in taken {
                table.upsert(&PendingChange::new(item, ChangeType::ADD)).unwrap();
            }
        }
        let outcome = run(&mut db, |a| {
            a.undo_pending_changes(&[ItemSpec::new("$/P/b.txt", RecursionType::None)])
        });
        assert_eq!(outcome, TransactionOutcome::RequiresOnline);
        assert!(PendingChangeTable::new(db.connection()).get("$/P/b.txt").unwrap().is_some());
    }

    /// Tables mapped onto a real directory so disk checks see its files.
    fn seeded_on_disk(root: &Path) -> LocalDb {
        let root = root.to_string_lossy().replace('\\', "/");
        let mut db = LocalDb::open_in_memory().unwrap();
        db.transact(|conn| {
            let mut access = LocalAccess::new(conn)?;
            access.set_working_folders(&[WorkingFolder::mapped("$/P", &root)])?;
            LocalVersionTable::new(conn)
                .upsert(&LocalVersionRow::new("$/P/a.txt", format!("{root}/a.txt"), 5))?;
            Ok(TransactionOutcome::Committed(()))
        })
        .unwrap();
        db
    }

    #[test]
    fn untracked_file_at_undo_target_requires_online() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = seeded_on_disk(dir.path());
        run(&mut db, |a| a.pend_changes(&[ChangeRequest::rename("$/P/a.txt", "$/P/b.txt")]));
        std::fs::write(dir.path().join("a.txt"), "untracked").unwrap();

        let outcome = run(&mut db, |a| {
            a.undo_pending_changes(&[ItemSpec::new("$/P/b.txt", RecursionType::None)])
        });
        assert_eq!(outcome, TransactionOutcome::RequiresOnline);
        assert!(PendingChangeTable::new(db.connection()).get("$/P/b.txt").unwrap().is_some());
    }

    #[test]
    fn blocking_add_skips_relocation_targets_present_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = seeded_on_disk(dir.path());
        run(&mut db, |a| a.pend_changes(&[ChangeRequest::rename("$/P/a.txt", "$/P/b.txt")]));
        run(&mut db, |a| a.pend_changes(&[ChangeRequest::add("$/P/a.txt")]));
        std::fs::write(dir.path().join("a.txt"), "new content").unwrap();
        std::fs::write(dir.path().join("a.txt.add"), "stray").unwrap();

        run(&mut db, |a| {
            a.undo_pending_changes(&[ItemSpec::new("$/P/b.txt", RecursionType::None)])
        })
        .committed()
        .unwrap();

        let changes = pending(&db);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].server_item, "$/P/a.txt.add1");
    }

    #[test]
    fn items_extended_include_pending_adds_in_order() {
        let mut db = seeded();
        run(&mut db, |a| a.pend_changes(&[ChangeRequest::add("$/P/0-new.txt")]));
        let rows = run(&mut db, |a| {
            a.query_items_extended(
                &[ItemSpec::new("$/P", RecursionType::OneLevel)],
                DeletedState::NonDeleted,
                ItemType::File,
            )
            .map(TransactionOutcome::Committed)
        })
        .committed()
        .unwrap();
        let names: Vec<_> = rows[0].iter().map(|i| i.target_server_item.as_str()).collect();
        assert_eq!(names, vec!["$/P/0-new.txt", "$/P/a.txt"]);
    }

    #[test]
    fn after_checkin_advances_versions() {
        let mut db = seeded();
        run(&mut db, |a| a.pend_changes(&[ChangeRequest::edit("$/P/a.txt")]));
        let committed = pending(&db);
        run(&mut db, |a| {
            a.after_checkin(9, &committed, &[])?;
            a.sync_pending_changes(&[], INITIAL_PENDING_CHANGES_SIGNATURE)?;
            Ok(TransactionOutcome::Committed(()))
        });
        let row = LocalVersionTable::new(db.connection()).get("$/P/a.txt").unwrap().unwrap();
        assert_eq!(row.version, 9);
        assert!(pending(&db).is_empty());
    }
}
