//! Release pull request body assembly.
//!
//! Collects the changelog entry of every changed package, orders them so the
//! most significant public releases come first, and prefixes a preamble that
//! tells reviewers what merging the PR will do.

use std::cmp::Ordering;
use std::fs;

use camino::Utf8PathBuf;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::changelog;
use crate::severity::BumpLevel;
use crate::workspace::PackageInfo;

/// Errors from building a release body.
#[derive(Error, Debug)]
pub enum ReleaseBodyError {
    /// A changed package has no changelog.
    #[error("changelog not found for {package}: {path}")]
    ChangelogNotFound {
        /// Package name.
        package: String,
        /// Expected changelog path.
        path: Utf8PathBuf,
    },

    /// The changelog exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Changelog path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result alias for release body operations.
pub type ReleaseBodyResult<T> = Result<T, ReleaseBodyError>;

/// One package's section of the release body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseEntry {
    /// Severity used for ordering.
    pub highest_level: BumpLevel,
    /// Private packages sort after public ones.
    pub private: bool,
    /// `## name@version` heading followed by the changelog entry.
    pub content: String,
}

/// Context for the fixed preamble.
#[derive(Debug, Clone, Copy)]
pub struct Preamble<'a> {
    /// Base branch the release PR targets.
    pub branch: &'a str,
    /// Active prerelease tag, if in pre mode.
    pub pre_tag: Option<&'a str>,
    /// Whether merging publishes automatically.
    pub auto_publish: bool,
}

impl Preamble<'_> {
    /// Render the preamble, ending with the `# Releases` heading.
    pub fn render(&self) -> String {
        let branch = self.branch;
        let merge_outcome = if self.auto_publish {
            "the packages will be published to npm automatically"
        } else {
            "publish to npm yourself or configure a publish command to publish automatically"
        };
        let pre_notice = if self.pre_tag.is_some() {
            format!(
                "\n⚠️⚠️⚠️⚠️⚠️⚠️\n`{branch}` is currently in **pre mode** so this branch has prereleases \
                 rather than normal releases. If you want to exit prereleases, run \
                 `changeset pre exit` on `{branch}`.\n⚠️⚠️⚠️⚠️⚠️⚠️\n"
            )
        } else {
            String::new()
        };

        format!(
            "This PR was opened by changepr.\n\n\
             When you're ready to do a release, you can merge this and {merge_outcome}.\n\n\
             If you're not ready to do a release yet, that's fine, whenever you add more \
             changesets to {branch}, this PR will be updated.\n\
             {pre_notice}\n# Releases\n"
        )
    }
}

/// Read and extract the changelog entry for each package.
///
/// Reads run in parallel; the result keeps the order of `packages`.
#[instrument(skip(packages), fields(count = packages.len()))]
pub fn collect_entries(packages: &[PackageInfo]) -> ReleaseBodyResult<Vec<ReleaseEntry>> {
    packages.par_iter().map(package_entry).collect()
}

fn package_entry(pkg: &PackageInfo) -> ReleaseBodyResult<ReleaseEntry> {
    let path = pkg.dir.join("CHANGELOG.md");
    let text = fs::read_to_string(&path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ReleaseBodyError::ChangelogNotFound {
                package: pkg.name.clone(),
                path: path.clone(),
            }
        } else {
            ReleaseBodyError::Io {
                path: path.clone(),
                source,
            }
        }
    })?;

    let entry = changelog::extract(&text, &pkg.version);
    debug!(package = %pkg.name, level = %entry.highest_level, "collected changelog entry");
    Ok(ReleaseEntry {
        highest_level: entry.highest_level,
        private: pkg.private,
        content: format!("## {}@{}\n\n{}", pkg.name, pkg.version, entry.content),
    })
}

/// Public before private, then higher severity first.
pub fn release_order(a: &ReleaseEntry, b: &ReleaseEntry) -> Ordering {
    a.private
        .cmp(&b.private)
        .then_with(|| b.highest_level.cmp(&a.highest_level))
}

/// Drop empty entries, stable-sort, and join with newlines.
pub fn assemble(mut entries: Vec<ReleaseEntry>) -> String {
    entries.retain(|entry| !entry.content.trim().is_empty());
    entries.sort_by(release_order);
    entries
        .into_iter()
        .map(|entry| entry.content)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the full pull request body for `packages`.
pub fn build(packages: &[PackageInfo], preamble: &Preamble<'_>) -> ReleaseBodyResult<String> {
    let entries = collect_entries(packages)?;
    Ok(format!("{}{}", preamble.render(), assemble(entries)))
}
