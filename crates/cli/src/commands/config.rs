use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use tfvc_client::config::{global_config_path, ClientConfig};

use crate::output::{print_output, OutputFormat};

#[derive(Debug, Args)]
pub struct ConfigArgs {}

#[derive(Debug, Serialize)]
pub struct ConfigOutput<'a> {
    pub path: Option<PathBuf>,
    pub configuration_dir: PathBuf,
    pub computer_name: String,
    pub config: &'a ClientConfig,
}

pub fn run(_args: ConfigArgs, format: OutputFormat, config: &ClientConfig) -> anyhow::Result<()> {
    let output = ConfigOutput {
        path: global_config_path(),
        configuration_dir: config.resolved_configuration_dir(),
        computer_name: config.resolved_computer_name(),
        config,
    };
    print_output(format, &output, |o| {
        let path = o
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<no home directory>".to_string());
        format!(
            "config file:        {path}\nconfiguration dir:  {}\ncomputer name:      {}\nlocal workspaces:   {}\nlog filter:         {}",
            o.configuration_dir.display(),
            o.computer_name,
            if o.config.local.enabled { "enabled" } else { "disabled" },
            o.config.log.filter.as_deref().unwrap_or("(RUST_LOG)"),
        )
    })?;
    Ok(())
}
