use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use tfvc_client::replay::journal::QueuedEditJournal;

use crate::output::{print_output, OutputFormat};

#[derive(Debug, Args)]
pub struct QueuedArgs {
    /// Per-workspace state directory
    pub workspace_dir: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct QueuedOutput {
    pub edits: Vec<String>,
}

pub fn run(args: QueuedArgs, format: OutputFormat) -> anyhow::Result<()> {
    let journal = QueuedEditJournal::in_workspace_dir(&args.workspace_dir);
    let edits: Vec<String> = journal.load()?.iter().map(str::to_string).collect();

    print_output(format, &QueuedOutput { edits }, |o| {
        if o.edits.is_empty() {
            "No queued edits".to_string()
        } else {
            o.edits.join("\n")
        }
    })?;
    Ok(())
}
