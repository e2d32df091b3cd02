//! Argument parser and subcommands for the `changepr` binary.
//!
//! [`Cli`] and [`Commands`] live here rather than in `main.rs` so that the
//! integration tests and `cargo xtask` (man pages, shell completions via
//! [`command()`]) can reach them. Each subcommand's logic is in [`commands`].

pub mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Set the process-wide owo-colors override. Call once, before printing.
    pub fn apply(self) {
        match self {
            Self::Auto => {}
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG                   Log filter (e.g., debug, changepr=trace)
    CHANGEPR_LOG_PATH          Explicit log file path
    CHANGEPR_LOG_DIR           Log directory
    BITBUCKET_CLIENT_ID        OAuth consumer key
    BITBUCKET_CLIENT_SECRET    OAuth consumer secret
    BITBUCKET_REPO_FULL_NAME   Repository slug (workspace/repo)
    BITBUCKET_BRANCH           Base branch for the release PR
    BITBUCKET_COMMIT           Commit the release branch is reset to
    NPM_TOKEN                  Token written to ~/.npmrc before publishing
";

/// Command-line interface definition for changepr.
#[derive(Parser)]
#[command(name = "changepr")]
#[command(about = "Release pull requests for changeset monorepos on Bitbucket", long_about = None)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long, global = true)]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available subcommands for the CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Version packages and open the release PR, or publish after merge
    Run(commands::run::RunArgs),

    /// Show pending changesets and pre-release mode
    Status(commands::status::StatusArgs),

    /// Print the changelog entry for one version
    Entry(commands::entry::EntryArgs),

    /// Diagnose configuration and environment
    Doctor(commands::doctor::DoctorArgs),

    /// Show tool, configuration, and workspace information
    Info(commands::info::InfoArgs),
}

/// Returns the clap command for documentation generation
pub fn command() -> clap::Command {
    Cli::command()
}
