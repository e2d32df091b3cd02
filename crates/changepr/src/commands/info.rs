//! `changepr info`: tool, configuration and workspace details.

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use changepr_core::config::{self, Config};
use changepr_core::workspace::{self, Workspace};

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct ToolInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl ToolInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    log_level: String,
    pr_title: String,
    branch_prefix: String,
    pull_requests: bool,
    remote: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    publish_command: Option<String>,
}

impl ConfigInfo {
    fn from_config(config: &Config, cwd: &camino::Utf8Path) -> Self {
        Self {
            config_file: config::find_project_config(cwd).map(|p| p.to_string()),
            log_level: config.log_level.as_str().to_string(),
            pr_title: config.pull_request.title().to_string(),
            branch_prefix: config.pull_request.branch_prefix().to_string(),
            pull_requests: config.pull_request.enabled(),
            remote: config.git.remote().to_string(),
            version_command: config.commands.version.clone(),
            publish_command: config.commands.publish.clone(),
        }
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    tool: ToolInfo,
    config: ConfigInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    workspace: Option<Workspace>,
}

/// Print tool, configuration, and workspace information.
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let workspace = match workspace::read_workspace(cwd) {
        Ok(ws) => Some(ws),
        Err(err) => {
            debug!(error = %err, "no workspace detected");
            None
        }
    };
    let info = FullInfo {
        tool: ToolInfo::new(),
        config: ConfigInfo::from_config(config, cwd),
        workspace,
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{} {}", info.tool.name.bold(), info.tool.version.green());
    if !info.tool.description.is_empty() {
        println!("{}", info.tool.description);
    }
    if !info.tool.license.is_empty() {
        println!("{}: {}", "License".dimmed(), info.tool.license);
    }
    if !info.tool.repository.is_empty() {
        println!("{}: {}", "Repository".dimmed(), info.tool.repository.cyan());
    }

    println!();
    println!("{}", "Configuration".bold().underline());
    match &info.config.config_file {
        Some(path) => println!("{}: {}", "Config file".dimmed(), path.cyan()),
        None => println!("{}: {}", "Config file".dimmed(), "none loaded".yellow()),
    }
    println!("{}: {}", "Log level".dimmed(), info.config.log_level);
    println!("{}: {}", "PR title".dimmed(), info.config.pr_title);
    println!("{}: {}", "Branch prefix".dimmed(), info.config.branch_prefix);
    println!("{}: {}", "Pull requests".dimmed(), info.config.pull_requests);
    println!("{}: {}", "Remote".dimmed(), info.config.remote);
    if let Some(cmd) = &info.config.version_command {
        println!("{}: {}", "Version command".dimmed(), cmd.cyan());
    }
    if let Some(cmd) = &info.config.publish_command {
        println!("{}: {}", "Publish command".dimmed(), cmd.cyan());
    }

    println!();
    println!("{}", "Workspace".bold().underline());
    match &info.workspace {
        Some(ws) => {
            println!("{}: {}", "Tool".dimmed(), ws.tool.to_string().cyan());
            println!("{}: {}", "Root".dimmed(), ws.root);
            super::print_package_table(&ws.packages);
        }
        None => println!("  {} {}", "○".yellow(), "No package.json found".yellow()),
    }

    Ok(())
}
