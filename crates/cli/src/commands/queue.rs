use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tracing::info;

use tfvc_client::replay::journal::QueuedEditJournal;
use tfvc_common::VcError;

use crate::output::{print_output, OutputFormat};

#[derive(Debug, Args)]
pub struct QueueArgs {
    /// Per-workspace state directory
    pub workspace_dir: PathBuf,
    /// Local paths that were edited
    #[arg(required = true)]
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct QueueOutput {
    pub queued: Vec<String>,
    pub total: usize,
}

pub fn run(args: QueueArgs, format: OutputFormat) -> anyhow::Result<()> {
    if let Some(blank) = args.paths.iter().find(|p| p.trim().is_empty()) {
        return Err(VcError::usage(format!("cannot queue an empty path `{blank}`")).into());
    }

    let journal = QueuedEditJournal::in_workspace_dir(&args.workspace_dir);
    let set = journal
        .add(args.paths.as_slice())
        .with_context(|| format!("failed to queue edits in `{}`", args.workspace_dir.display()))?;
    info!(added = args.paths.len(), total = set.len(), "edits queued");

    let output = QueueOutput {
        queued: args.paths,
        total: set.len(),
    };
    print_output(format, &output, |o| {
        format!("Queued {} edit(s); {} waiting for replay", o.queued.len(), o.total)
    })?;
    Ok(())
}
