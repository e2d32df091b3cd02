//! Release orchestrator.
//!
//! One run of the workflow takes exactly one of three paths, decided up front
//! by [`plan`] from the pending change descriptors:
//!
//! - **No changes**: nothing pending and nothing to publish. No external
//!   calls are made.
//! - **Publish only**: nothing pending but a publish command is configured.
//!   Runs it, pushes tags, and reports which packages were released.
//! - **Version and PR**: descriptors are pending. Runs the version command
//!   on the release branch, commits, and opens or updates the release pull
//!   request (or pushes straight to the base branch when PRs are disabled).
//!
//! All side effects go through [`Collaborators`], and progress is reported
//! through an `on_event` callback so the CLI can render it.

use std::sync::LazyLock;

use camino::Utf8PathBuf;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::bitbucket::{HostResult, PullRequestDraft, PullRequestHost};
use crate::changeset::{self, ChangesetState};
use crate::error::{ReleaseError, ReleaseResult};
use crate::git::{ResetMode, Vcs};
use crate::npm::{self, NpmrcStatus};
use crate::process::{self, CommandRunner, ProcessOutput};
use crate::release_body::{self, Preamble};
use crate::tool;
use crate::workspace::{self, PackageInfo, Workspace, WorkspaceTool};

// ──────────────────────────────────────────────
// Options
// ──────────────────────────────────────────────

/// Credentials for writing `~/.npmrc` before publishing.
#[derive(Debug, Clone)]
pub struct NpmAuthOptions {
    /// Home directory holding `.npmrc`.
    pub home: Utf8PathBuf,
    /// Token from `NPM_TOKEN`.
    pub token: Option<String>,
    /// Registry host.
    pub registry: String,
}

/// Everything a release run needs to know.
#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    /// Workspace root.
    pub cwd: Utf8PathBuf,
    /// Branch the release PR targets.
    pub base_branch: String,
    /// Commit the release branch is reset to. Defaults to `base_branch`.
    pub base_commit: Option<String>,
    /// Custom version command; the installed changesets CLI otherwise.
    pub version_command: Option<String>,
    /// Publish command; enables the publish path and auto-publish wording.
    pub publish_command: Option<String>,
    /// Open a pull request instead of pushing to the base branch.
    pub create_pr: bool,
    /// Pull request title before any prerelease suffix.
    pub pr_title: String,
    /// Commit message before any prerelease suffix.
    pub commit_message: String,
    /// Release branch prefix, followed by `base_branch`.
    pub branch_prefix: String,
    /// Committer name.
    pub git_user_name: Option<String>,
    /// Committer email.
    pub git_user_email: Option<String>,
    /// Set up npm credentials before publishing.
    pub npm_auth: Option<NpmAuthOptions>,
}

impl ReleaseOptions {
    /// The branch the version commit is pushed to when PRs are enabled.
    pub fn release_branch(&self) -> String {
        format!("{}{}", self.branch_prefix, self.base_branch)
    }
}

/// External systems the run acts on.
pub struct Collaborators<'a> {
    /// Runs version and publish commands.
    pub runner: &'a mut dyn CommandRunner,
    /// Git operations.
    pub vcs: &'a mut dyn Vcs,
    /// Pull request host, or why none could be set up. Only consulted
    /// when PRs are enabled.
    pub host: HostResult<&'a mut dyn PullRequestHost>,
}

// ──────────────────────────────────────────────
// Phases and events
// ──────────────────────────────────────────────

/// Which path a run takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePath {
    /// Nothing pending, nothing to publish.
    NoChanges,
    /// Publish unpublished packages.
    PublishOnly,
    /// Version packages and open the release PR.
    VersionAndPr,
}

/// Steps of a run, for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePhase {
    /// Authenticate with the pull request host.
    Connect,
    /// Prepare the release branch.
    Branch,
    /// Run the version command.
    Version,
    /// Commit version changes.
    Commit,
    /// Push to the remote.
    Push,
    /// Create or update the pull request.
    PullRequest,
    /// Run the publish command.
    Publish,
    /// Push release tags.
    Tags,
}

impl std::fmt::Display for ReleasePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Branch => write!(f, "branch"),
            Self::Version => write!(f, "version"),
            Self::Commit => write!(f, "commit"),
            Self::Push => write!(f, "push"),
            Self::PullRequest => write!(f, "pull request"),
            Self::Publish => write!(f, "publish"),
            Self::Tags => write!(f, "tags"),
        }
    }
}

/// Progress events emitted during a run.
#[derive(Debug, Clone)]
pub enum ReleaseEvent {
    /// A phase has started.
    PhaseStarted(ReleasePhase),
    /// A phase has completed.
    PhaseCompleted(ReleasePhase, PhaseOutcome),
}

/// Outcome of a single phase.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PhaseOutcome {
    /// Phase completed successfully.
    Success {
        /// Description of what happened.
        message: String,
    },
    /// Phase was skipped.
    Skipped {
        /// Why the phase was skipped.
        reason: String,
    },
    /// Phase failed without aborting the run.
    Failed {
        /// What went wrong.
        message: String,
    },
}

impl PhaseOutcome {
    fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

/// What happened to the release pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum PullRequestAction {
    /// A new pull request was opened.
    Created {
        /// Its id.
        id: u64,
    },
    /// An open pull request was updated.
    Updated {
        /// Its id.
        id: u64,
    },
    /// The host call failed; the branch was still pushed.
    Failed {
        /// The host's error message.
        message: String,
    },
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "path")]
pub enum ReleaseOutcome {
    /// Nothing was done.
    NoChanges,
    /// The publish command ran.
    Published {
        /// Packages the publish output reported as tagged.
        released: Vec<PackageInfo>,
    },
    /// Versions were bumped.
    Versioned {
        /// Packages whose version changed.
        changed: Vec<PackageInfo>,
        /// Branch the version commit was pushed to.
        branch: String,
        /// Whether a commit was made.
        committed: bool,
        /// Pull request result; `None` when PRs are disabled.
        pull_request: Option<PullRequestAction>,
    },
}

// ──────────────────────────────────────────────
// Plan
// ──────────────────────────────────────────────

/// Decide which path a run takes.
pub fn plan(state: &ChangesetState, has_publish_command: bool) -> ReleasePath {
    match (state.changesets.is_empty(), has_publish_command) {
        (true, false) => ReleasePath::NoChanges,
        (true, true) => ReleasePath::PublishOnly,
        (false, _) => ReleasePath::VersionAndPr,
    }
}

// ──────────────────────────────────────────────
// Execute
// ──────────────────────────────────────────────

/// Run the release workflow.
///
/// Calls `on_event` at phase boundaries so the CLI can show progress.
#[instrument(skip_all, fields(cwd = %options.cwd, base = %options.base_branch))]
pub fn run_release(
    options: &ReleaseOptions,
    collaborators: Collaborators<'_>,
    mut on_event: impl FnMut(ReleaseEvent),
) -> ReleaseResult<ReleaseOutcome> {
    let state = changeset::resolve_state(&options.cwd)?;
    let path = plan(&state, options.publish_command.is_some());
    info!(?path, pending = state.changesets.len(), "planned release");

    match path {
        ReleasePath::NoChanges => Ok(ReleaseOutcome::NoChanges),
        ReleasePath::PublishOnly => publish(options, collaborators, &mut on_event),
        ReleasePath::VersionAndPr => version(options, &state, collaborators, &mut on_event),
    }
}

fn publish(
    options: &ReleaseOptions,
    collaborators: Collaborators<'_>,
    on_event: &mut impl FnMut(ReleaseEvent),
) -> ReleaseResult<ReleaseOutcome> {
    let Collaborators { runner, vcs, .. } = collaborators;
    let command = options
        .publish_command
        .as_deref()
        .ok_or_else(|| ReleaseError::Configuration("no publish command".into()))?;

    on_event(ReleaseEvent::PhaseStarted(ReleasePhase::Publish));
    if let Some(auth) = &options.npm_auth {
        let status = npm::setup_npm_auth(&auth.home, auth.token.as_deref(), &auth.registry)?;
        debug!(?status, "npm auth");
        if status == NpmrcStatus::Missing {
            warn!("publishing without npm credentials");
        }
    }
    let output = process::run_command_line(runner, command, &options.cwd)?;
    on_event(ReleaseEvent::PhaseCompleted(
        ReleasePhase::Publish,
        PhaseOutcome::success(format!("ran `{command}`")),
    ));

    on_event(ReleaseEvent::PhaseStarted(ReleasePhase::Tags));
    vcs.push_tags()?;
    on_event(ReleaseEvent::PhaseCompleted(
        ReleasePhase::Tags,
        PhaseOutcome::success("pushed tags"),
    ));

    let workspace = workspace::read_workspace(&options.cwd)?;
    let released = released_packages(&workspace, &output)?;
    info!(count = released.len(), "publish finished");
    Ok(ReleaseOutcome::Published { released })
}

fn version(
    options: &ReleaseOptions,
    state: &ChangesetState,
    collaborators: Collaborators<'_>,
    on_event: &mut impl FnMut(ReleaseEvent),
) -> ReleaseResult<ReleaseOutcome> {
    let Collaborators { runner, vcs, host } = collaborators;
    let pre_tag = state.pre_state.as_ref().map(|s| s.tag.as_str());
    let release_branch = options.release_branch();

    // Authenticate before any git call.
    let host = if options.create_pr {
        let host = host?;
        on_event(ReleaseEvent::PhaseStarted(ReleasePhase::Connect));
        host.connect()?;
        on_event(ReleaseEvent::PhaseCompleted(
            ReleasePhase::Connect,
            PhaseOutcome::success("authenticated"),
        ));
        Some(host)
    } else {
        None
    };

    if options.git_user_name.is_some() || options.git_user_email.is_some() {
        vcs.configure_user(
            options.git_user_name.as_deref(),
            options.git_user_email.as_deref(),
        )?;
    }

    on_event(ReleaseEvent::PhaseStarted(ReleasePhase::Branch));
    if options.create_pr {
        let target = options
            .base_commit
            .as_deref()
            .unwrap_or(&options.base_branch);
        vcs.checkout_branch(&release_branch)?;
        vcs.reset(target, ResetMode::Hard)?;
        on_event(ReleaseEvent::PhaseCompleted(
            ReleasePhase::Branch,
            PhaseOutcome::success(format!("{release_branch} reset to {target}")),
        ));
    } else {
        on_event(ReleaseEvent::PhaseCompleted(
            ReleasePhase::Branch,
            PhaseOutcome::skipped("pull requests disabled"),
        ));
    }

    let before = workspace::read_workspace(&options.cwd)?.versions_by_directory();

    on_event(ReleaseEvent::PhaseStarted(ReleasePhase::Version));
    let ran = run_version_command(runner, options)?;
    on_event(ReleaseEvent::PhaseCompleted(
        ReleasePhase::Version,
        PhaseOutcome::success(format!("ran `{ran}`")),
    ));

    let after = workspace::read_workspace(&options.cwd)?;
    let changed = after.changed_packages(&before);
    info!(changed = changed.len(), "version command finished");

    let suffix = pre_tag.map(|tag| format!(" ({tag})")).unwrap_or_default();
    let title = format!("{}{suffix}", options.pr_title);
    let message = format!("{}{suffix}", options.commit_message);

    // Built before the push: a missing changelog must fail first.
    let body = if options.create_pr {
        Some(release_body::build(
            &changed,
            &Preamble {
                branch: &options.base_branch,
                pre_tag,
                auto_publish: options.publish_command.is_some(),
            },
        )?)
    } else {
        None
    };

    on_event(ReleaseEvent::PhaseStarted(ReleasePhase::Commit));
    let committed = if vcs.is_clean()? {
        on_event(ReleaseEvent::PhaseCompleted(
            ReleasePhase::Commit,
            PhaseOutcome::skipped("working tree clean"),
        ));
        false
    } else {
        vcs.commit_all(&message)?;
        on_event(ReleaseEvent::PhaseCompleted(
            ReleasePhase::Commit,
            PhaseOutcome::success(message.clone()),
        ));
        true
    };

    on_event(ReleaseEvent::PhaseStarted(ReleasePhase::Push));
    let (Some(host), Some(body)) = (host, body) else {
        vcs.push(&options.base_branch, false)?;
        on_event(ReleaseEvent::PhaseCompleted(
            ReleasePhase::Push,
            PhaseOutcome::success(format!("pushed to {}", options.base_branch)),
        ));
        return Ok(ReleaseOutcome::Versioned {
            changed,
            branch: options.base_branch.clone(),
            committed,
            pull_request: None,
        });
    };
    vcs.push(&release_branch, true)?;
    on_event(ReleaseEvent::PhaseCompleted(
        ReleasePhase::Push,
        PhaseOutcome::success(format!("force-pushed {release_branch}")),
    ));

    on_event(ReleaseEvent::PhaseStarted(ReleasePhase::PullRequest));
    let action = sync_pull_request(
        host,
        &PullRequestDraft {
            title: &title,
            description: &body,
            source: &release_branch,
            destination: &options.base_branch,
        },
    );
    let outcome = match &action {
        PullRequestAction::Created { id } => PhaseOutcome::success(format!("created #{id}")),
        PullRequestAction::Updated { id } => PhaseOutcome::success(format!("updated #{id}")),
        PullRequestAction::Failed { message } => PhaseOutcome::Failed {
            message: message.clone(),
        },
    };
    on_event(ReleaseEvent::PhaseCompleted(ReleasePhase::PullRequest, outcome));

    Ok(ReleaseOutcome::Versioned {
        changed,
        branch: release_branch,
        committed,
        pull_request: Some(action),
    })
}

/// Run the configured version command, or the installed changesets CLI.
fn run_version_command(
    runner: &mut dyn CommandRunner,
    options: &ReleaseOptions,
) -> ReleaseResult<String> {
    if let Some(command) = &options.version_command {
        process::run_command_line(runner, command, &options.cwd)?;
        return Ok(command.clone());
    }
    let invocation = tool::resolve_version_command(&options.cwd)?;
    runner.run(&invocation.program, &invocation.args, &options.cwd)?;
    Ok(invocation.to_string())
}

/// Find the open release PR and update it, or create one.
///
/// Host failures are logged and reported, never fatal.
fn sync_pull_request(host: &mut dyn PullRequestHost, draft: &PullRequestDraft<'_>) -> PullRequestAction {
    // The token may have expired during the version command.
    if let Err(err) = host.connect() {
        warn!(error = %err, "failed to refresh host session");
        return PullRequestAction::Failed {
            message: err.to_string(),
        };
    }

    let existing = host
        .find_open(draft.source, draft.destination)
        .unwrap_or_else(|err| {
            warn!(error = %err, "failed to look up pull request");
            None
        });

    match existing {
        Some(pr) => match host.update(&pr, draft.title, draft.description) {
            Ok(()) => PullRequestAction::Updated { id: pr.id },
            Err(err) => {
                warn!(error = %err, id = pr.id, "failed to update pull request");
                PullRequestAction::Failed {
                    message: err.to_string(),
                }
            }
        },
        None => match host.create(draft) {
            Ok(pr) => PullRequestAction::Created { id: pr.id },
            Err(err) => {
                warn!(error = %err, "failed to create pull request");
                PullRequestAction::Failed {
                    message: err.to_string(),
                }
            }
        },
    }
}

static NEW_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"New tag:\s+(@[^/]+/[^@]+|[^/]+)@(\S+)").expect("valid tag pattern")
});

/// Packages reported as tagged in publish output.
///
/// Multi-package workspaces name each package on a `New tag:` line and every
/// name must exist in the workspace. A root workspace has one package, which
/// is released if any `New tag:` line appears.
pub fn released_packages(
    workspace: &Workspace,
    output: &ProcessOutput,
) -> ReleaseResult<Vec<PackageInfo>> {
    let text = output.combined();

    if workspace.tool == WorkspaceTool::Root {
        let Some(pkg) = workspace.packages.first() else {
            return Err(ReleaseError::Configuration("no package found in workspace".into()));
        };
        let tagged = text.lines().any(|line| line.contains("New tag:"));
        return Ok(if tagged { vec![pkg.clone()] } else { Vec::new() });
    }

    let mut released = Vec::new();
    for caps in text.lines().filter_map(|line| NEW_TAG.captures(line)) {
        let name = &caps[1];
        let pkg = workspace.find(name).ok_or_else(|| {
            ReleaseError::Configuration(format!("package \"{name}\" from publish output not found in workspace"))
        })?;
        released.push(pkg.clone());
    }
    Ok(released)
}
