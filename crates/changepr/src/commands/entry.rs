//! `changepr entry`: print one version's changelog entry.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use changepr_core::changelog::{self, ChangelogEntry};
use changepr_core::severity::BumpLevel;

/// Arguments for the `entry` subcommand.
#[derive(Args, Debug)]
pub struct EntryArgs {
    /// Version whose entry to print (e.g. 1.2.0)
    pub version: String,

    /// Changelog to read
    #[arg(long, short = 'f', default_value = "CHANGELOG.md")]
    pub file: Utf8PathBuf,
}

/// JSON shape of `entry --json`.
#[derive(Serialize, Debug)]
struct EntryReport<'a> {
    content: &'a str,
    highest_level: BumpLevel,
    /// `highest_level` on the `0..=3` scale.
    rank: u8,
}

impl<'a> From<&'a ChangelogEntry> for EntryReport<'a> {
    fn from(entry: &'a ChangelogEntry) -> Self {
        Self {
            content: &entry.content,
            highest_level: entry.highest_level,
            rank: entry.highest_level.rank(),
        }
    }
}

/// Print the changelog entry and its highest bump level.
#[instrument(name = "cmd_entry", skip_all, fields(version = %args.version))]
pub fn cmd_entry(args: EntryArgs, global_json: bool, cwd: &Utf8Path) -> anyhow::Result<()> {
    let path = cwd.join(&args.file);
    debug!(%path, "reading changelog");
    let text = std::fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;
    let entry = changelog::extract(&text, &args.version);

    if global_json {
        println!("{}", serde_json::to_string_pretty(&EntryReport::from(&entry))?);
    } else {
        println!(
            "{} {}",
            "Highest level:".dimmed(),
            entry.highest_level.to_string().green()
        );
        println!();
        println!("{}", entry.content);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_changelog_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let cwd = Utf8Path::from_path(tmp.path()).unwrap();
        let err = cmd_entry(
            EntryArgs {
                version: "1.0.0".into(),
                file: "CHANGELOG.md".into(),
            },
            false,
            cwd,
        )
        .unwrap_err();
        assert!(err.to_string().contains("CHANGELOG.md"));
    }

    #[test]
    fn report_carries_numeric_rank() {
        let entry = changelog::extract("## 2.0.0\n\n### Major Changes\n\n- drop node 16", "2.0.0");
        let json = serde_json::to_value(EntryReport::from(&entry)).unwrap();
        assert_eq!(json["highest_level"], "major");
        assert_eq!(json["rank"], 3);
        assert_eq!(json["content"], "### Major Changes\n\n- drop node 16");
    }
}
