//! `changepr run`: the CLI face of [`changepr_core::release`].

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tracing::{debug, instrument, warn};

use changepr_core::bitbucket::{BitbucketSession, BitbucketSettings, HostResult, PullRequestHost};
use changepr_core::config::Config;
use changepr_core::git::SystemGit;
use changepr_core::process::SystemRunner;
use changepr_core::release::{
    self, Collaborators, NpmAuthOptions, PhaseOutcome, PullRequestAction, ReleaseEvent,
    ReleaseOptions, ReleaseOutcome,
};

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Command that publishes unpublished packages (e.g. "pnpm release")
    #[arg(long, value_name = "COMMAND")]
    pub publish_command: Option<String>,

    /// Command that applies pending changesets (default: changeset version)
    #[arg(long, value_name = "COMMAND")]
    pub version_command: Option<String>,

    /// Push version changes to the base branch instead of opening a PR
    #[arg(long)]
    pub no_pr: bool,

    /// Pull request title
    #[arg(long, value_name = "TITLE")]
    pub pr_title: Option<String>,

    /// Commit message for the version commit
    #[arg(long, value_name = "MESSAGE")]
    pub commit_message: Option<String>,

    /// Committer name
    #[arg(long, value_name = "NAME")]
    pub git_user_name: Option<String>,

    /// Committer email
    #[arg(long, value_name = "EMAIL")]
    pub git_user_email: Option<String>,

    /// Base branch the release PR targets
    #[arg(long, env = "BITBUCKET_BRANCH", default_value = "master")]
    pub branch: String,

    /// Commit the release branch is reset to (default: the base branch)
    #[arg(long, env = "BITBUCKET_COMMIT")]
    pub commit: Option<String>,
}

/// Merge flags over configuration.
fn release_options(args: RunArgs, config: &Config, cwd: &Utf8Path) -> ReleaseOptions {
    let publish_command = args.publish_command.or_else(|| config.commands.publish.clone());
    let npm_auth = publish_command.as_ref().and_then(|_| {
        let home = directories::BaseDirs::new()?.home_dir().to_path_buf();
        let home = Utf8PathBuf::try_from(home).ok()?;
        Some(NpmAuthOptions {
            home,
            token: std::env::var("NPM_TOKEN").ok(),
            registry: config.npm.registry().to_string(),
        })
    });

    ReleaseOptions {
        cwd: cwd.to_path_buf(),
        base_branch: args.branch,
        base_commit: args.commit.filter(|c| !c.is_empty()),
        version_command: args
            .version_command
            .or_else(|| config.commands.version.clone()),
        publish_command,
        create_pr: !args.no_pr && config.pull_request.enabled(),
        pr_title: args
            .pr_title
            .unwrap_or_else(|| config.pull_request.title().to_string()),
        commit_message: args
            .commit_message
            .unwrap_or_else(|| config.pull_request.commit_message().to_string()),
        branch_prefix: config.pull_request.branch_prefix().to_string(),
        git_user_name: args.git_user_name.or_else(|| config.git.user_name.clone()),
        git_user_email: args.git_user_email.or_else(|| config.git.user_email.clone()),
        npm_auth,
    }
}

/// Execute the run command.
#[instrument(name = "cmd_run", skip_all)]
pub fn cmd_run(
    args: RunArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing run command");

    let options = release_options(args, config, cwd);
    let mut runner = SystemRunner;
    let mut git = SystemGit::new(cwd, config.git.remote());
    let mut session: BitbucketSession;
    let host: HostResult<&mut dyn PullRequestHost> = match BitbucketSettings::resolve(
        config.bitbucket.api_base.as_deref(),
        config.bitbucket.token_url.as_deref(),
        config.bitbucket.repository.as_deref(),
        |name| std::env::var(name).ok(),
    )
    .and_then(BitbucketSession::new)
    {
        Ok(created) => {
            session = created;
            Ok(&mut session)
        }
        Err(err) => {
            debug!(error = %err, "bitbucket session unavailable");
            Err(err)
        }
    };

    let spinner = (!global_json).then(progress_spinner);
    let outcome = release::run_release(
        &options,
        Collaborators {
            runner: &mut runner,
            vcs: &mut git,
            host,
        },
        |event| {
            if let Some(spinner) = &spinner {
                handle_event(spinner, event);
            }
        },
    );
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }
    let outcome = outcome.context("release run failed")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome {
        ReleaseOutcome::NoChanges => {
            println!("{} No changesets found", "○".yellow());
        }
        ReleaseOutcome::Published { released } => {
            if released.is_empty() {
                println!("{} No packages were published", "○".yellow());
            } else {
                println!("{} Published {} package(s)", "✓".green().bold(), released.len());
                super::print_package_table(&released);
            }
        }
        ReleaseOutcome::Versioned {
            changed,
            branch,
            committed,
            pull_request,
        } => {
            if !committed {
                println!("{} Nothing to commit on {}", "○".yellow(), branch.cyan());
            }
            if !changed.is_empty() {
                println!("{} Versioned {} package(s)", "✓".green().bold(), changed.len());
                super::print_package_table(&changed);
            }
            match pull_request {
                Some(PullRequestAction::Created { id }) => {
                    println!("{} Opened pull request #{id} from {}", "✓".green(), branch.cyan());
                }
                Some(PullRequestAction::Updated { id }) => {
                    println!("{} Updated pull request #{id} from {}", "✓".green(), branch.cyan());
                }
                Some(PullRequestAction::Failed { message }) => {
                    warn!(%message, "pull request not synced");
                    println!(
                        "{} Pushed {} but the pull request could not be synced: {message}",
                        "!".yellow().bold(),
                        branch.cyan()
                    );
                }
                None => println!("{} Pushed to {}", "✓".green(), branch.cyan()),
            }
        }
    }

    Ok(())
}

fn progress_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
        spinner.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]));
    }
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// Render a release event above the spinner.
fn handle_event(spinner: &ProgressBar, event: ReleaseEvent) {
    match event {
        ReleaseEvent::PhaseStarted(phase) => spinner.set_message(format!("{phase}...")),
        ReleaseEvent::PhaseCompleted(phase, outcome) => {
            let line = match outcome {
                PhaseOutcome::Success { message } => format!(
                    "  {} {} {}",
                    "✓".green(),
                    phase.to_string().bold(),
                    message.dimmed()
                ),
                PhaseOutcome::Skipped { reason } => format!(
                    "  {} {} {}",
                    "–".yellow(),
                    phase.to_string().bold(),
                    format!("skipped: {reason}").dimmed()
                ),
                PhaseOutcome::Failed { message } => format!(
                    "  {} {} {}",
                    "✗".red(),
                    phase.to_string().bold(),
                    message.dimmed()
                ),
            };
            spinner.println(line);
        }
    }
}
