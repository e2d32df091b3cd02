//! `changepr status`: pending changesets and pre-release mode.

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use changepr_core::BumpLevel;
use changepr_core::changeset::{self, ChangesetState};

/// Arguments for the `status` subcommand.
#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Also list each changeset's summary
    #[arg(long)]
    pub verbose_summaries: bool,
}

/// Highest requested level per package across pending changesets.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct PlannedRelease {
    name: String,
    level: BumpLevel,
}

#[derive(Serialize)]
struct StatusReport {
    #[serde(flatten)]
    state: ChangesetState,
    releases: Vec<PlannedRelease>,
}

fn planned_releases(state: &ChangesetState) -> Vec<PlannedRelease> {
    let mut by_name = std::collections::BTreeMap::<&str, BumpLevel>::new();
    for release in state.changesets.iter().flat_map(|c| &c.releases) {
        let level = by_name.entry(release.name.as_str()).or_default();
        *level = (*level).max(release.level);
    }
    by_name
        .into_iter()
        .map(|(name, level)| PlannedRelease {
            name: name.to_string(),
            level,
        })
        .collect()
}

/// Print pending changesets and pre-release mode.
#[instrument(name = "cmd_status", skip_all)]
pub fn cmd_status(
    args: StatusArgs,
    global_json: bool,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing status command");

    let state = changeset::resolve_state(cwd)?;
    let releases = planned_releases(&state);

    if global_json {
        let report = StatusReport { state, releases };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if let Some(pre) = &state.pre_state {
        println!(
            "{} Pre-release mode active (tag: {})",
            "⚠".yellow().bold(),
            pre.tag.cyan()
        );
    }

    if state.changesets.is_empty() {
        println!("{} No changesets found", "○".yellow());
        return Ok(());
    }

    println!(
        "{} ({})",
        "Pending changesets".bold().underline(),
        state.changesets.len()
    );
    for descriptor in &state.changesets {
        println!("  {}", descriptor.id.cyan());
        if args.verbose_summaries {
            for line in descriptor.summary.lines().filter(|l| !l.trim().is_empty()) {
                println!("    {}", line.dimmed());
            }
        }
    }

    println!();
    println!("{}", "Planned releases".bold().underline());
    for release in &releases {
        println!("  {} {}", release.name, release.level.to_string().green());
    }

    Ok(())
}
