// Row-level access to the four local-workspace tables.
//
// Every accessor borrows a connection (normally the open transaction of
// `LocalDb::transact`) and returns `anyhow::Result` with context.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use tfvc_common::flags::ChangeType;
use tfvc_common::path::server;
use tfvc_common::types::{
    ItemType, LockLevel, PendingChange, PropertyValue, RecursionType, WorkingFolder,
    INITIAL_PENDING_CHANGES_SIGNATURE,
};

fn depth_as_str(depth: RecursionType) -> &'static str {
    match depth {
        RecursionType::None => "none",
        RecursionType::OneLevel => "one_level",
        RecursionType::Full => "full",
    }
}

fn parse_depth(s: &str) -> Option<RecursionType> {
    match s {
        "none" => Some(RecursionType::None),
        "one_level" => Some(RecursionType::OneLevel),
        "full" => Some(RecursionType::Full),
        _ => None,
    }
}

fn parse_uuid(s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn invalid_text(column: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        anyhow!("invalid {what} `{value}`").into(),
    )
}

/// Whether `item` sits under `scope` at the depth `recursion` allows.
pub(crate) fn in_scope(scope: &str, recursion: RecursionType, item: &str) -> bool {
    if !server::is_child_or_equal(scope, item) {
        return false;
    }
    match recursion {
        RecursionType::None => server::equals(scope, item),
        RecursionType::OneLevel => server::depth(item) <= server::depth(scope) + 1,
        RecursionType::Full => true,
    }
}

/// Move `item` from below `from` to the same place below `to`.
pub(crate) fn rebase(from: &str, to: &str, item: &str) -> String {
    let skip = from.trim_end_matches('/').len();
    let tail = item.get(skip..).unwrap_or("");
    server::combine(to, tail)
}

// ── Workspace properties ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceProperties {
    /// Signature of the client's pending-change table.
    pub client_signature: Uuid,
    /// Last signature both sides agreed on.
    pub base_signature: Uuid,
    pub last_reconcile: Option<DateTime<Utc>>,
}

pub struct PropertiesTable<'a> {
    conn: &'a Connection,
}

impl<'a> PropertiesTable<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self) -> Result<WorkspaceProperties> {
        self.conn
            .query_row(
                "SELECT client_signature, base_signature, last_reconcile \
                 FROM workspace_properties WHERE id = 1",
                [],
                |row| {
                    let client: String = row.get(0)?;
                    let base: String = row.get(1)?;
                    let last: Option<String> = row.get(2)?;
                    Ok(WorkspaceProperties {
                        client_signature: parse_uuid(&client)?,
                        base_signature: parse_uuid(&base)?,
                        last_reconcile: last
                            .as_deref()
                            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                            .map(|dt| dt.with_timezone(&Utc)),
                    })
                },
            )
            .context("failed to read workspace properties")
    }

    /// Record a signature acknowledged by the server as both client and base.
    pub fn acknowledge(&self, signature: Uuid) -> Result<()> {
        self.conn
            .execute(
                "UPDATE workspace_properties SET client_signature = ?1, base_signature = ?1 WHERE id = 1",
                params![signature.to_string()],
            )
            .context("failed to store acknowledged signature")?;
        Ok(())
    }

    pub fn mark_reconciled(&self, signature: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.conn
            .execute(
                "UPDATE workspace_properties \
                 SET client_signature = ?1, base_signature = ?1, last_reconcile = ?2 WHERE id = 1",
                params![signature.to_string(), at.to_rfc3339()],
            )
            .context("failed to record reconcile")?;
        Ok(())
    }

    /// Give the client table a new signature after a local mutation.
    ///
    /// Only the first mutation after an acknowledgement issues one; later
    /// mutations keep it until the server has seen it.
    pub fn regenerate_client_signature(&self, table_empty: bool) -> Result<Uuid> {
        let props = self.get()?;
        if props.client_signature != props.base_signature {
            return Ok(props.client_signature);
        }
        let signature = if table_empty {
            INITIAL_PENDING_CHANGES_SIGNATURE
        } else {
            Uuid::new_v4()
        };
        self.conn
            .execute(
                "UPDATE workspace_properties SET client_signature = ?1 WHERE id = 1",
                params![signature.to_string()],
            )
            .context("failed to regenerate client signature")?;
        Ok(signature)
    }
}

// ── Working folders ─────────────────────────────────────────────────

pub struct WorkingFolderTable<'a> {
    conn: &'a Connection,
}

impl<'a> WorkingFolderTable<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn list(&self) -> Result<Vec<WorkingFolder>> {
        let mut stmt = self
            .conn
            .prepare("SELECT server_item, local_item, depth FROM working_folders ORDER BY server_item")
            .context("failed to prepare working folder query")?;
        let rows = stmt
            .query_map([], |row| {
                let depth: String = row.get(2)?;
                Ok(WorkingFolder {
                    server_item: row.get(0)?,
                    local_item: row.get(1)?,
                    depth: parse_depth(&depth).ok_or_else(|| invalid_text(2, "depth", &depth))?,
                })
            })
            .context("failed to query working folders")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read working folder rows")
    }

    pub fn replace(&self, folders: &[WorkingFolder]) -> Result<()> {
        self.conn
            .execute("DELETE FROM working_folders", [])
            .context("failed to clear working folders")?;
        for folder in folders {
            self.conn
                .execute(
                    "INSERT OR REPLACE INTO working_folders (server_item, local_item, depth) \
                     VALUES (?1, ?2, ?3)",
                    params![folder.server_item, folder.local_item, depth_as_str(folder.depth)],
                )
                .with_context(|| format!("failed to insert working folder `{}`", folder.server_item))?;
        }
        Ok(())
    }
}

// ── Local versions ──────────────────────────────────────────────────

/// What the workspace has on disk for one committed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVersionRow {
    pub server_item: String,
    pub local_item: Option<String>,
    pub item_id: i32,
    pub item_type: ItemType,
    pub version: i32,
    /// The server has not yet been told about this row.
    pub pending_reconcile: bool,
    pub deleted: bool,
}

impl LocalVersionRow {
    pub fn new(server_item: impl Into<String>, local_item: impl Into<String>, version: i32) -> Self {
        Self {
            server_item: server_item.into(),
            local_item: Some(local_item.into()),
            item_id: 0,
            item_type: ItemType::File,
            version,
            pending_reconcile: false,
            deleted: false,
        }
    }
}

const LOCAL_VERSION_COLUMNS: &str =
    "server_item, local_item, item_id, item_type, version, pending_reconcile, deleted";

fn row_to_local_version(row: &Row<'_>) -> rusqlite::Result<LocalVersionRow> {
    let item_type: String = row.get(3)?;
    Ok(LocalVersionRow {
        server_item: row.get(0)?,
        local_item: row.get(1)?,
        item_id: row.get(2)?,
        item_type: ItemType::parse(&item_type)
            .ok_or_else(|| invalid_text(3, "item type", &item_type))?,
        version: row.get(4)?,
        pending_reconcile: row.get::<_, i64>(5)? != 0,
        deleted: row.get::<_, i64>(6)? != 0,
    })
}

pub struct LocalVersionTable<'a> {
    conn: &'a Connection,
}

impl<'a> LocalVersionTable<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, server_item: &str) -> Result<Option<LocalVersionRow>> {
        self.conn
            .query_row(
                &format!("SELECT {LOCAL_VERSION_COLUMNS} FROM local_versions WHERE server_item = ?1"),
                params![server_item],
                row_to_local_version,
            )
            .optional()
            .with_context(|| format!("failed to read local version of `{server_item}`"))
    }

    pub fn list(&self) -> Result<Vec<LocalVersionRow>> {
        self.select(&format!("SELECT {LOCAL_VERSION_COLUMNS} FROM local_versions"))
    }

    /// Rows the server has not yet been told about.
    pub fn pending_reconcile(&self) -> Result<Vec<LocalVersionRow>> {
        self.select(&format!(
            "SELECT {LOCAL_VERSION_COLUMNS} FROM local_versions WHERE pending_reconcile = 1"
        ))
    }

    pub fn has_pending_reconcile(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM local_versions WHERE pending_reconcile = 1",
                [],
                |row| row.get(0),
            )
            .context("failed to count rows awaiting reconcile")?;
        Ok(count > 0)
    }

    pub fn clear_pending_reconcile(&self) -> Result<()> {
        self.conn
            .execute("UPDATE local_versions SET pending_reconcile = 0", [])
            .context("failed to clear pending reconcile marks")?;
        Ok(())
    }

    pub fn upsert(&self, row: &LocalVersionRow) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO local_versions \
                 (server_item, local_item, item_id, item_type, version, pending_reconcile, deleted) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.server_item,
                    row.local_item,
                    row.item_id,
                    row.item_type.as_str(),
                    row.version,
                    row.pending_reconcile as i64,
                    row.deleted as i64,
                ],
            )
            .with_context(|| format!("failed to store local version of `{}`", row.server_item))?;
        Ok(())
    }

    pub fn remove(&self, server_item: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM local_versions WHERE server_item = ?1", params![server_item])
            .with_context(|| format!("failed to remove local version of `{server_item}`"))?;
        Ok(rows > 0)
    }

    /// Move `from` and everything below it to `to`, marking each moved row
    /// for reconcile. Returns the number of rows moved.
    pub fn relocate(&self, from: &str, to: &str, folders: &[WorkingFolder]) -> Result<usize> {
        let moved: Vec<LocalVersionRow> = self
            .list()?
            .into_iter()
            .filter(|row| server::is_child_or_equal(from, &row.server_item))
            .collect();
        for row in &moved {
            self.remove(&row.server_item)?;
        }
        for row in &moved {
            let server_item = rebase(from, to, &row.server_item);
            let local_item = tfvc_common::path::mapping::server_to_local(folders, &server_item);
            self.upsert(&LocalVersionRow {
                local_item,
                server_item,
                pending_reconcile: true,
                ..row.clone()
            })?;
        }
        Ok(moved.len())
    }

    fn select(&self, sql: &str) -> Result<Vec<LocalVersionRow>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .context("failed to prepare local version query")?;
        let rows = stmt
            .query_map([], row_to_local_version)
            .context("failed to query local versions")?;
        let mut rows = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read local version rows")?;
        rows.sort_by(|a, b| server::compare(&a.server_item, &b.server_item));
        Ok(rows)
    }
}

// ── Pending changes ─────────────────────────────────────────────────

const PENDING_CHANGE_COLUMNS: &str = "server_item, source_server_item, local_item, change_type, \
     item_type, version, lock_level, encoding, properties";

fn row_to_pending_change(row: &Row<'_>) -> rusqlite::Result<PendingChange> {
    let change_type: i64 = row.get(3)?;
    let item_type: String = row.get(4)?;
    let lock_level: String = row.get(6)?;
    let properties: String = row.get(8)?;
    let properties: Vec<PropertyValue> = serde_json::from_str(&properties).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(PendingChange {
        server_item: row.get(0)?,
        source_server_item: row.get(1)?,
        local_item: row.get(2)?,
        change_type: ChangeType::from_bits_truncate(change_type as u32),
        item_type: ItemType::parse(&item_type)
            .ok_or_else(|| invalid_text(4, "item type", &item_type))?,
        version: row.get(5)?,
        lock_level: LockLevel::parse(&lock_level)
            .ok_or_else(|| invalid_text(6, "lock level", &lock_level))?,
        encoding: row.get(7)?,
        properties,
    })
}

pub struct PendingChangeTable<'a> {
    conn: &'a Connection,
}

impl<'a> PendingChangeTable<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, server_item: &str) -> Result<Option<PendingChange>> {
        self.conn
            .query_row(
                &format!("SELECT {PENDING_CHANGE_COLUMNS} FROM pending_changes WHERE server_item = ?1"),
                params![server_item],
                row_to_pending_change,
            )
            .optional()
            .with_context(|| format!("failed to read pending change on `{server_item}`"))
    }

    /// Every pending change, ordered by server item.
    pub fn list(&self) -> Result<Vec<PendingChange>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {PENDING_CHANGE_COLUMNS} FROM pending_changes"))
            .context("failed to prepare pending change query")?;
        let rows = stmt
            .query_map([], row_to_pending_change)
            .context("failed to query pending changes")?;
        let mut changes = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read pending change rows")?;
        changes.sort_by(|a, b| server::compare(&a.server_item, &b.server_item));
        Ok(changes)
    }

    pub fn count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM pending_changes", [], |row| row.get(0))
            .context("failed to count pending changes")
    }

    pub fn upsert(&self, change: &PendingChange) -> Result<()> {
        let properties =
            serde_json::to_string(&change.properties).context("failed to encode change properties")?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO pending_changes \
                 (server_item, source_server_item, local_item, change_type, item_type, version, \
                  lock_level, encoding, properties) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    change.server_item,
                    change.source_server_item,
                    change.local_item,
                    change.change_type.bits() as i64,
                    change.item_type.as_str(),
                    change.version,
                    change.lock_level.as_str(),
                    change.encoding,
                    properties,
                ],
            )
            .with_context(|| format!("failed to store pending change on `{}`", change.server_item))?;
        Ok(())
    }

    pub fn remove(&self, server_item: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM pending_changes WHERE server_item = ?1", params![server_item])
            .with_context(|| format!("failed to remove pending change on `{server_item}`"))?;
        Ok(rows > 0)
    }

    /// Replace the whole table with the server's view.
    pub fn replace_all(&self, changes: &[PendingChange]) -> Result<()> {
        self.conn
            .execute("DELETE FROM pending_changes", [])
            .context("failed to clear pending changes")?;
        for change in changes {
            self.upsert(change)?;
        }
        Ok(())
    }

    /// Move pending changes at or below `from` to `to`, skipping `except`.
    pub fn relocate(
        &self,
        from: &str,
        to: &str,
        except: Option<&str>,
        folders: &[WorkingFolder],
    ) -> Result<usize> {
        let moved: Vec<PendingChange> = self
            .list()?
            .into_iter()
            .filter(|change| server::is_child_or_equal(from, &change.server_item))
            .filter(|change| except.map_or(true, |e| !server::equals(e, &change.server_item)))
            .collect();
        for change in &moved {
            self.remove(&change.server_item)?;
        }
        for change in &moved {
            let server_item = rebase(from, to, &change.server_item);
            self.upsert(&PendingChange {
                local_item: tfvc_common::path::mapping::server_to_local(folders, &server_item),
                server_item,
                ..change.clone()
            })?;
        }
        Ok(moved.len())
    }
}
