// CLI subcommand dispatch.

use clap::Subcommand;

use tfvc_client::config::ClientConfig;

use crate::output::OutputFormat;

pub mod config;
pub mod pending;
pub mod queue;
pub mod queued;

#[derive(Subcommand)]
pub enum Command {
    /// Record edits made while disconnected for later replay
    Queue(queue::QueueArgs),
    /// List edits waiting to be replayed
    Queued(queued::QueuedArgs),
    /// List pending changes held in a local workspace's tables
    Pending(pending::PendingArgs),
    /// Show the effective client configuration
    Config(config::ConfigArgs),
}

pub fn run(cmd: Command, format: OutputFormat, client: &ClientConfig) -> anyhow::Result<()> {
    match cmd {
        Command::Queue(args) => queue::run(args, format),
        Command::Queued(args) => queued::run(args, format),
        Command::Pending(args) => pending::run(args, format),
        Command::Config(args) => config::run(args, format, client),
    }
}
