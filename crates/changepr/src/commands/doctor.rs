//! `changepr doctor`: environment and configuration diagnostics.

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use changepr_core::bitbucket::{CLIENT_ID_VAR, CLIENT_SECRET_VAR, REPO_VAR};
use changepr_core::config;
use changepr_core::git;
use changepr_core::tool;

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct DoctorReport {
    tools: Vec<ToolCheck>,
    credentials: Vec<CredentialCheck>,
    config: ConfigStatus,
    directories: DirectoryPaths,
    cwd: String,
    git_repo: bool,
}

#[derive(Serialize)]
struct ToolCheck {
    name: &'static str,
    found: bool,
    purpose: &'static str,
}

/// Only presence is reported, never the value.
#[derive(Serialize)]
struct CredentialCheck {
    name: &'static str,
    set: bool,
    purpose: &'static str,
}

#[derive(Serialize)]
struct ConfigStatus {
    file: Option<String>,
    found: bool,
    changesets_cli: Option<String>,
}

#[derive(Serialize)]
struct DirectoryPaths {
    config: Option<String>,
    cache: Option<String>,
    data: Option<String>,
}

impl DoctorReport {
    fn gather(cwd: &camino::Utf8Path, env: impl Fn(&str) -> Option<String>) -> Self {
        let config_file = config::find_project_config(cwd);
        let tool_check = |name, purpose| ToolCheck {
            name,
            found: tool::has_binary(name),
            purpose,
        };
        let credential = |name, purpose| CredentialCheck {
            name,
            set: env(name).is_some_and(|v| !v.is_empty()),
            purpose,
        };

        Self {
            tools: vec![
                tool_check("git", "commit and push release branches"),
                tool_check("node", "run the changesets CLI"),
            ],
            credentials: vec![
                credential(CLIENT_ID_VAR, "Bitbucket OAuth consumer key"),
                credential(CLIENT_SECRET_VAR, "Bitbucket OAuth consumer secret"),
                credential(REPO_VAR, "Bitbucket repository slug"),
                credential("NPM_TOKEN", "npm publish token"),
            ],
            config: ConfigStatus {
                found: config_file.is_some(),
                file: config_file.map(|p| p.to_string()),
                changesets_cli: tool::find_changesets_cli(cwd).map(|p| p.to_string()),
            },
            directories: DirectoryPaths {
                config: config::user_config_dir().map(|p| p.to_string()),
                cache: config::user_cache_dir().map(|p| p.to_string()),
                data: config::user_data_dir().map(|p| p.to_string()),
            },
            cwd: cwd.to_string(),
            git_repo: git::is_inside_repo(cwd).unwrap_or(false),
        }
    }
}

/// Run diagnostics and report environment status.
#[instrument(name = "cmd_doctor", skip_all, fields(json_output))]
pub fn cmd_doctor(
    _args: DoctorArgs,
    global_json: bool,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing doctor command");

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Gathering diagnostics...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    let report = DoctorReport::gather(cwd, |name| std::env::var(name).ok());
    spinner.finish_and_clear();

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Tools".bold().underline());
    for check in &report.tools {
        if check.found {
            println!("  {} {} {}", "✓".green(), check.name, check.purpose.dimmed());
        } else {
            println!(
                "  {} {} not found on PATH {}",
                "✗".red(),
                check.name,
                format!("({})", check.purpose).dimmed()
            );
        }
    }
    match &report.config.changesets_cli {
        Some(path) => println!("  {} @changesets/cli {}", "✓".green(), path.cyan()),
        None => println!(
            "  {} @changesets/cli not installed {}",
            "○".yellow(),
            "(needed unless a version command is configured)".dimmed()
        ),
    }
    println!();

    println!("{}", "Credentials".bold().underline());
    for check in &report.credentials {
        let mark = if check.set {
            "✓".green().to_string()
        } else {
            "○".yellow().to_string()
        };
        println!("  {mark} {} {}", check.name, check.purpose.dimmed());
    }
    println!();

    println!("{}", "Configuration".bold().underline());
    if let Some(file) = &report.config.file {
        println!("  {} Config file: {}", "✓".green(), file.cyan());
    } else {
        println!("  {} No config file found", "○".yellow());
        offer_config_creation()?;
    }
    println!();

    println!("{}", "Directories".bold().underline());
    print_dir("  Config", report.directories.config.as_deref());
    print_dir("  Cache", report.directories.cache.as_deref());
    print_dir("  Data", report.directories.data.as_deref());
    println!("  {}: {}", "Working directory".dimmed(), report.cwd.cyan());
    if !report.git_repo {
        println!(
            "  {} not inside a git work tree; `run` needs one",
            "⚠".yellow()
        );
    }

    Ok(())
}

fn print_dir(label: &str, path: Option<&str>) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) => println!("{}", p.cyan()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}

/// Offer to write a default user config when none exists.
fn offer_config_creation() -> anyhow::Result<()> {
    let Some(config_dir) = config::user_config_dir() else {
        return Ok(());
    };
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Ok(());
    }

    let config_path = config_dir.join("config.yaml");
    let create = Confirm::new("Create a default config file?")
        .with_default(false)
        .with_help_message(&format!("Will create {config_path}"))
        .prompt();

    // Declined or interrupted.
    if !matches!(create, Ok(true)) {
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    let yaml = serde_saphyr::to_string(&config::Config::default())?;
    std::fs::write(&config_path, yaml)?;
    println!("  {} Created {}", "✓".green(), config_path.cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_report_presence_only() {
        let cwd = camino::Utf8PathBuf::from("/nonexistent");
        let report = DoctorReport::gather(&cwd, |name| {
            (name == CLIENT_ID_VAR).then(|| "secret-id".to_string())
        });
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("secret-id"));

        let set: Vec<_> = report
            .credentials
            .iter()
            .filter(|c| c.set)
            .map(|c| c.name)
            .collect();
        assert_eq!(set, vec![CLIENT_ID_VAR]);
        assert!(!report.config.found);
        assert!(report.config.changesets_cli.is_none());
        assert!(!report.git_repo);
    }

    #[test]
    fn empty_credentials_count_as_unset() {
        let cwd = camino::Utf8PathBuf::from("/nonexistent");
        let report = DoctorReport::gather(&cwd, |_| Some(String::new()));
        assert!(report.credentials.iter().all(|c| !c.set));
    }

    #[test]
    fn json_doctor_succeeds() {
        let cwd = camino::Utf8PathBuf::from("/tmp");
        assert!(cmd_doctor(DoctorArgs::default(), true, &cwd).is_ok());
    }
}
