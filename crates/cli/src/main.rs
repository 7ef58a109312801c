// tfvc CLI entry point.

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tfvc_client::config::ClientConfig;

mod commands;
mod exit_code;
mod output;

use exit_code::ExitCode;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "tfvc", about = "Inspect local version-control workspace state")]
struct Cli {
    /// Force JSON output even on a terminal
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: commands::Command,
}

fn init_tracing(config: &ClientConfig) {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => config
            .log
            .filter
            .as_deref()
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> process::ExitCode {
    let cli = Cli::parse();
    let config = ClientConfig::load();
    init_tracing(&config);

    let format = OutputFormat::detect(cli.json);
    match commands::run(cli.command, format, &config) {
        Ok(()) => ExitCode::Success.into(),
        Err(error) => {
            output::print_anyhow_error(format, &error);
            ExitCode::from_error(&error).into()
        }
    }
}
