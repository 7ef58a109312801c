use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use tfvc_client::local::db::LocalDb;
use tfvc_client::local::tables::{PendingChangeTable, PropertiesTable};
use tfvc_client::local::LOCAL_DB_FILE;
use tfvc_common::flags::ChangeType;
use tfvc_common::types::PendingChange;
use tfvc_common::VcError;

use crate::output::{print_output, OutputFormat};

#[derive(Debug, Args)]
pub struct PendingArgs {
    /// Per-workspace state directory
    pub workspace_dir: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct PendingOutput {
    pub client_signature: String,
    pub base_signature: String,
    pub last_reconcile: Option<String>,
    pub changes: Vec<PendingChange>,
}

pub fn run(args: PendingArgs, format: OutputFormat) -> anyhow::Result<()> {
    let path = args.workspace_dir.join(LOCAL_DB_FILE);
    if !path.exists() {
        return Err(VcError::LocalStore(format!("no local tables at `{}`", path.display())).into());
    }

    let db = LocalDb::open(&path)?;
    let conn = db.connection();
    let properties = PropertiesTable::new(conn).get()?;
    let output = PendingOutput {
        client_signature: properties.client_signature.to_string(),
        base_signature: properties.base_signature.to_string(),
        last_reconcile: properties.last_reconcile.map(|at| at.to_rfc3339()),
        changes: PendingChangeTable::new(conn).list()?,
    };

    print_output(format, &output, render_human)?;
    Ok(())
}

fn render_human(output: &PendingOutput) -> String {
    if output.changes.is_empty() {
        return "No pending changes".to_string();
    }
    let mut lines: Vec<String> = output
        .changes
        .iter()
        .map(|change| {
            let local = change.local_item.as_deref().unwrap_or("-");
            format!("{:<16} {}  ({local})", change_names(change.change_type), change.server_item)
        })
        .collect();
    if output.client_signature != output.base_signature {
        lines.push("(not yet reconciled with the server)".to_string());
    }
    lines.join("\n")
}

fn change_names(change_type: ChangeType) -> String {
    let names: Vec<String> = change_type
        .iter_names()
        .map(|(name, _)| name.to_lowercase())
        .collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(",")
    }
}
