//! changepr CLI
#![deny(unsafe_code)]

use anyhow::Context;
use changepr::{Cli, Commands, commands};
use changepr_core::config::ConfigLoader;
use clap::Parser;
use tracing::debug;

mod observability;

/// Reject non-UTF-8 paths up front; everything downstream is camino.
fn utf8_path(path: std::path::PathBuf, what: &str) -> anyhow::Result<camino::Utf8PathBuf> {
    camino::Utf8PathBuf::try_from(path).map_err(|e| {
        anyhow::anyhow!("{what} is not valid UTF-8: {}", e.into_path_buf().display())
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = utf8_path(cwd, "current directory")?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(path) = cli.config.clone() {
        loader = loader.with_file(utf8_path(path, "config path")?);
    }
    let config = loader.load().context("failed to load configuration")?;

    let obs_config = observability::ObservabilityConfig::from_env_with_overrides(
        config
            .log_dir
            .as_ref()
            .map(|dir| dir.as_std_path().to_path_buf()),
    );
    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(&obs_config, env_filter)
        .context("failed to initialize logging")?;

    debug!(
        cwd = %cwd,
        json = cli.json,
        pull_requests = config.pull_request.enabled(),
        "changepr starting"
    );

    let result = match cli.command {
        Commands::Run(args) => commands::run::cmd_run(args, cli.json, &config, &cwd),
        Commands::Status(args) => commands::status::cmd_status(args, cli.json, &cwd),
        Commands::Entry(args) => commands::entry::cmd_entry(args, cli.json, &cwd),
        Commands::Doctor(args) => commands::doctor::cmd_doctor(args, cli.json, &cwd),
        Commands::Info(args) => commands::info::cmd_info(args, cli.json, &config, &cwd),
    };
    if let Err(err) = &result {
        tracing::error!(error = %err, "fatal error");
    }
    result
}
