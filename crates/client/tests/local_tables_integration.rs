use tempfile::tempdir;
use tfvc_client::local::access::LocalAccess;
use tfvc_client::local::db::LocalDb;
use tfvc_client::local::tables::{LocalVersionRow, LocalVersionTable, PropertiesTable};
use tfvc_client::local::transaction::TransactionOutcome;
use tfvc_common::flags::ChangeType;
use tfvc_common::types::{
    ChangeRequest, ItemSpec, RecursionType, WorkingFolder, INITIAL_PENDING_CHANGES_SIGNATURE,
};

#[test]
fn offline_work_persists_across_reopen() {
    let tmp = tempdir().expect("tempdir should be created");
    let path = tmp.path().join("workspaces").join("lw").join("local.db");

    {
        let mut db = LocalDb::open(&path).expect("local db should open");
        db.transact(|conn| {
            let mut access = LocalAccess::new(conn)?;
            access.set_working_folders(&[WorkingFolder::mapped("$/Project", "/src/project")])?;
            LocalVersionTable::new(conn)
                .upsert(&LocalVersionRow::new("$/Project/readme.md", "/src/project/readme.md", 7))?;
            Ok(TransactionOutcome::Committed(()))
        })
        .expect("seed should commit");

        let outcome = db
            .transact(|conn| {
                LocalAccess::new(conn)?.pend_changes(&[
                    ChangeRequest::edit("/src/project/readme.md"),
                ])
            })
            .expect("edit should run");
        let batch = outcome.committed().expect("edit should be answered offline");
        assert!(batch.failures.is_empty());
    }

    let db = LocalDb::open(&path).expect("local db should reopen");
    let access = LocalAccess::new(db.connection()).expect("tables should load");
    let pending = access
        .query_pending_changes(&ItemSpec::new("$/Project", RecursionType::Full))
        .expect("query should succeed");
    assert_eq!(pending.len(), 1);
    assert!(pending[0].change_type.contains(ChangeType::EDIT));
    assert_eq!(pending[0].version, 7);

    let versions = access
        .query_local_versions(&[ItemSpec::new("/src/project", RecursionType::Full)])
        .expect("query should succeed");
    assert_eq!(versions[0][0].version, 7);

    let props = PropertiesTable::new(db.connection()).get().expect("properties should load");
    assert_ne!(props.client_signature, props.base_signature);
    assert_ne!(props.client_signature, INITIAL_PENDING_CHANGES_SIGNATURE);
}

#[test]
fn online_only_requests_leave_tables_untouched() {
    let mut db = LocalDb::open_in_memory().expect("local db should open");
    db.transact(|conn| {
        let mut access = LocalAccess::new(conn)?;
        access.set_working_folders(&[
            WorkingFolder::mapped("$/Project", "/src/project"),
            WorkingFolder::mapped("$/Other", "/src/other"),
        ])?;
        Ok(TransactionOutcome::Committed(()))
    })
    .expect("seed should commit");

    let outcome = db
        .transact(|conn| LocalAccess::new(conn)?.pend_changes(&[ChangeRequest::rename("$/Project", "$/Renamed")]))
        .expect("rename should run");
    assert_eq!(outcome, TransactionOutcome::RequiresOnline);

    let props = PropertiesTable::new(db.connection()).get().expect("properties should load");
    assert_eq!(props.client_signature, INITIAL_PENDING_CHANGES_SIGNATURE);
}
