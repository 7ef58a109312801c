use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use tfvc_common::types::INITIAL_PENDING_CHANGES_SIGNATURE;

use super::transaction::TransactionOutcome;

const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE workspace_properties (
    id                  INTEGER PRIMARY KEY CHECK (id = 1),
    client_signature    TEXT NOT NULL,
    base_signature      TEXT NOT NULL,
    last_reconcile      TEXT NULL
);

CREATE TABLE working_folders (
    server_item     TEXT PRIMARY KEY COLLATE NOCASE,
    local_item      TEXT NULL,
    depth           TEXT NOT NULL
);

CREATE TABLE local_versions (
    server_item         TEXT PRIMARY KEY COLLATE NOCASE,
    local_item          TEXT NULL COLLATE NOCASE,
    item_id             INTEGER NOT NULL,
    item_type           TEXT NOT NULL,
    version             INTEGER NOT NULL,
    pending_reconcile   INTEGER NOT NULL DEFAULT 0,
    deleted             INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX local_versions_local_item_idx
    ON local_versions (local_item);

CREATE TABLE pending_changes (
    server_item         TEXT PRIMARY KEY COLLATE NOCASE,
    source_server_item  TEXT NULL,
    local_item          TEXT NULL COLLATE NOCASE,
    change_type         INTEGER NOT NULL,
    item_type           TEXT NOT NULL,
    version             INTEGER NOT NULL,
    lock_level          TEXT NOT NULL,
    encoding            INTEGER NOT NULL,
    properties          TEXT NOT NULL DEFAULT '[]'
);
"#;

const MIGRATIONS: &[(i64, &str)] = &[(1, MIGRATION_V1_SQL)];

/// The local tables of one LOCAL workspace.
#[derive(Debug)]
pub struct LocalDb {
    conn: Connection,
}

impl LocalDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create local.db parent directory `{}`", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open local.db at `{}`", path.display()))?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            ",
        )
        .context("failed to configure sqlite pragmas for local.db")?;

        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory local.db")?;
        Self::init(conn)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        ensure_migration_table(&conn)?;
        apply_pending_migrations(&mut conn)?;
        conn.execute(
            "INSERT OR IGNORE INTO workspace_properties (id, client_signature, base_signature) \
             VALUES (1, ?1, ?1)",
            params![INITIAL_PENDING_CHANGES_SIGNATURE.to_string()],
        )
        .context("failed to seed workspace properties")?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn schema_version(&self) -> Result<i64> {
        current_schema_version(&self.conn)
    }

    /// Run `body` in one SQLite transaction. Only a `Committed` outcome is
    /// committed; every other outcome and every error rolls back.
    pub fn transact<T>(
        &mut self,
        body: impl FnOnce(&Connection) -> Result<TransactionOutcome<T>>,
    ) -> Result<TransactionOutcome<T>> {
        let tx = self
            .conn
            .transaction()
            .context("failed to start local table transaction")?;
        let outcome = body(&tx)?;
        if outcome.is_committed() {
            tx.commit().context("failed to commit local table transaction")?;
        }
        Ok(outcome)
    }
}

fn ensure_migration_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY,
            applied_at  TEXT NOT NULL
        );
        ",
    )
    .context("failed to ensure schema_migrations table exists")
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| row.get(0))
        .context("failed to read current schema version")
}

fn apply_pending_migrations(conn: &mut Connection) -> Result<()> {
    let mut current_version = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current_version {
            continue;
        }

        let tx = conn.transaction().context("failed to start migration transaction")?;
        tx.execute_batch(sql)
            .with_context(|| format!("failed to apply local.db migration v{version}"))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, datetime('now'))",
            params![version],
        )
        .with_context(|| format!("failed to record migration v{version}"))?;
        tx.commit().with_context(|| format!("failed to commit migration v{version}"))?;
        current_version = *version;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const EXPECTED_TABLES: &[&str] = &[
        "schema_migrations",
        "workspace_properties",
        "working_folders",
        "local_versions",
        "pending_changes",
    ];

    #[test]
    fn open_creates_schema_and_records_latest_migration() {
        let tmp = TempDir::new().unwrap();
        let db = LocalDb::open(tmp.path().join("ws").join("local.db")).unwrap();

        for table in EXPECTED_TABLES {
            let exists: i64 = db
                .connection()
                .query_row(
                    "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "expected `{table}` table to exist");
        }
        assert_eq!(db.schema_version().unwrap(), 1);
    }

    #[test]
    fn reopen_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("local.db");
        drop(LocalDb::open(&path).unwrap());
        let db = LocalDb::open(&path).unwrap();
        assert_eq!(db.schema_version().unwrap(), 1);
        let rows: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM workspace_properties", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn only_committed_outcomes_persist() {
        let mut db = LocalDb::open_in_memory().unwrap();
        let insert = |conn: &Connection| {
            conn.execute(
                "INSERT INTO working_folders (server_item, local_item, depth) VALUES ('$/p', '/src/p', 'full')",
                [],
            )
        };

        db.transact(|conn| {
            insert(conn)?;
            Ok(TransactionOutcome::<()>::RequiresOnline)
        })
        .unwrap();
        db.transact(|conn| {
            insert(conn)?;
            Ok(TransactionOutcome::<()>::Aborted)
        })
        .unwrap();
        let count = |db: &LocalDb| -> i64 {
            db.connection()
                .query_row("SELECT COUNT(*) FROM working_folders", [], |row| row.get(0))
                .unwrap()
        };
        assert_eq!(count(&db), 0);

        db.transact(|conn| {
            insert(conn)?;
            Ok(TransactionOutcome::Committed(()))
        })
        .unwrap();
        assert_eq!(count(&db), 1);
    }
}
