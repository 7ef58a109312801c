// Bring the server's view of a local workspace in line with its tables.

use chrono::Utc;
use tracing::{debug, info};

use tfvc_common::types::Workspace;
use tfvc_common::VcError;

use crate::dispatch::Dispatcher;

use super::db::LocalDb;
use super::tables::{LocalVersionTable, PendingChangeTable, PropertiesTable};
use super::transaction::TransactionOutcome;
use super::store_error;

/// Reconcile one workspace. Returns whether anything was sent to the
/// server; `false` means both sides already agreed.
///
/// Failures reported by the server are surfaced through the event bus and
/// then fail the reconcile.
pub(crate) fn reconcile_workspace(
    dispatcher: &Dispatcher,
    workspace: &Workspace,
    db: &mut LocalDb,
    reconcile_missing: bool,
) -> Result<bool, VcError> {
    let conn = db.connection();
    let properties = PropertiesTable::new(conn).get().map_err(store_error)?;
    let awaiting = LocalVersionTable::new(conn)
        .has_pending_reconcile()
        .map_err(store_error)?;

    if !awaiting && !reconcile_missing {
        let server_signature =
            dispatcher.query_pending_change_signature(&workspace.name, &workspace.owner)?;
        if !server_signature.is_nil() && server_signature == properties.client_signature {
            debug!(workspace = %workspace.name, "signatures agree, reconcile skipped");
            return Ok(false);
        }
    }

    let pending = PendingChangeTable::new(conn).list().map_err(store_error)?;
    let updates = super::access::LocalAccess::new(conn)
        .and_then(|access| access.pending_local_version_updates())
        .map_err(store_error)?;

    let result = dispatcher.reconcile_local_workspace(
        &workspace.name,
        &workspace.owner,
        properties.client_signature,
        &pending,
        &updates,
        false,
        true,
    )?;

    if !result.failures.is_empty() {
        dispatcher
            .events()
            .report_failures(Some(&workspace.name), &result.failures);
        return Err(VcError::ReconcileFailed(result.failures));
    }

    db.transact(|conn| {
        if result.pending_changes_updated {
            PendingChangeTable::new(conn).replace_all(&result.new_pending_changes)?;
        }
        PropertiesTable::new(conn).mark_reconciled(result.new_signature, Utc::now())?;
        LocalVersionTable::new(conn).clear_pending_reconcile()?;
        Ok(TransactionOutcome::Committed(()))
    })
    .map_err(store_error)?;

    info!(
        workspace = %workspace.name,
        pending_changes = pending.len(),
        local_version_updates = updates.len(),
        pending_changes_updated = result.pending_changes_updated,
        "local workspace reconciled"
    );
    Ok(true)
}
