//! Pending change descriptors and pre-release state.
//!
//! Change descriptors live in `.changeset/<id>.md` as YAML front matter
//! naming the affected packages and their bump levels, followed by a free-form
//! summary. While the repository is in pre-release mode,
//! `.changeset/pre.json` lists the descriptors that have already been folded
//! into a prerelease and must be skipped.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::severity::BumpLevel;

/// Directory holding change descriptors, relative to the workspace root.
pub const CHANGESET_DIR: &str = ".changeset";

/// Errors from reading change descriptors.
#[derive(Error, Debug)]
pub enum ChangesetError {
    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file or directory being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A descriptor has no `---` delimited front matter.
    #[error("{path} has no front matter")]
    MissingFrontMatter {
        /// The descriptor file.
        path: Utf8PathBuf,
    },

    /// Front matter is not a map of package name to bump level.
    #[error("invalid front matter in {path}: {message}")]
    FrontMatter {
        /// The descriptor file.
        path: Utf8PathBuf,
        /// Parse error text.
        message: String,
    },

    /// `pre.json` is malformed.
    #[error("invalid pre-release state {path}: {source}")]
    PreState {
        /// Path to `pre.json`.
        path: Utf8PathBuf,
        /// Parse error.
        source: serde_json::Error,
    },
}

/// Result alias for change descriptor operations.
pub type ChangesetResult<T> = Result<T, ChangesetError>;

/// A package named by a change descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Release {
    /// Package name.
    pub name: String,
    /// Requested bump.
    pub level: BumpLevel,
}

/// One pending change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeDescriptor {
    /// File stem of the descriptor.
    pub id: String,
    /// Affected packages, sorted by name.
    pub releases: Vec<Release>,
    /// Markdown body after the front matter.
    pub summary: String,
}

/// `mode` field of `pre.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreMode {
    /// Prereleases are being produced.
    Pre,
    /// Pre mode was exited; the next version run leaves it.
    Exit,
}

/// Contents of `.changeset/pre.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreReleaseState {
    /// Current mode.
    pub mode: PreMode,
    /// Prerelease tag such as `beta`.
    pub tag: String,
    /// Versions at the time pre mode was entered.
    #[serde(default)]
    pub initial_versions: BTreeMap<String, String>,
    /// Descriptor ids already consumed by a prerelease.
    #[serde(default)]
    pub changesets: BTreeSet<String>,
}

impl PreReleaseState {
    /// Whether prerelease mode is in effect.
    pub fn is_active(&self) -> bool {
        self.mode == PreMode::Pre
    }
}

/// Pending descriptors after pre-release filtering.
#[derive(Debug, Clone, Serialize)]
pub struct ChangesetState {
    /// Active pre-release state, if any.
    pub pre_state: Option<PreReleaseState>,
    /// Descriptors that still need releasing.
    pub changesets: Vec<ChangeDescriptor>,
}

/// Read all pending descriptors under `root/.changeset`, sorted by id.
///
/// A missing directory means there is nothing pending.
#[instrument(fields(root = %root))]
pub fn read_changesets(root: &Utf8Path) -> ChangesetResult<Vec<ChangeDescriptor>> {
    let dir = root.join(CHANGESET_DIR);
    if !dir.is_dir() {
        debug!("no changeset directory");
        return Ok(Vec::new());
    }

    let entries = dir.read_dir_utf8().map_err(|source| ChangesetError::Io {
        path: dir.clone(),
        source,
    })?;

    let mut descriptors = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ChangesetError::Io {
            path: dir.clone(),
            source,
        })?;
        let path = entry.path();
        if path.extension() != Some("md") || entry.file_name().eq_ignore_ascii_case("README.md") {
            continue;
        }
        descriptors.push(read_descriptor(path)?);
    }

    descriptors.sort_by(|a, b| a.id.cmp(&b.id));
    debug!(count = descriptors.len(), "read change descriptors");
    Ok(descriptors)
}

fn read_descriptor(path: &Utf8Path) -> ChangesetResult<ChangeDescriptor> {
    let text = fs::read_to_string(path).map_err(|source| ChangesetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (front, summary) =
        split_front_matter(&text).ok_or_else(|| ChangesetError::MissingFrontMatter {
            path: path.to_path_buf(),
        })?;

    let levels: BTreeMap<String, BumpLevel> = if front.trim().is_empty() {
        BTreeMap::new()
    } else {
        serde_saphyr::from_str(front).map_err(|e| ChangesetError::FrontMatter {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
    };

    Ok(ChangeDescriptor {
        id: path.file_stem().unwrap_or_default().to_string(),
        releases: levels
            .into_iter()
            .map(|(name, level)| Release { name, level })
            .collect(),
        summary: summary.trim().to_string(),
    })
}

/// Split `---` delimited front matter from the body.
fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let rest = text.trim_start().strip_prefix("---")?;
    let rest = rest.strip_prefix('\r').unwrap_or(rest).strip_prefix('\n')?;
    if let Some(body) = rest.strip_prefix("---") {
        return Some(("", body));
    }
    let end = rest.find("\n---")?;
    let front = &rest[..end];
    let body = &rest[end + 4..];
    Some((front, body))
}

/// Read `.changeset/pre.json` if present.
#[instrument(fields(root = %root))]
pub fn read_pre_state(root: &Utf8Path) -> ChangesetResult<Option<PreReleaseState>> {
    let path = root.join(CHANGESET_DIR).join("pre.json");
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path).map_err(|source| ChangesetError::Io {
        path: path.clone(),
        source,
    })?;
    let state: PreReleaseState =
        serde_json::from_str(&text).map_err(|source| ChangesetError::PreState { path, source })?;
    debug!(mode = ?state.mode, tag = %state.tag, "read pre-release state");
    Ok(Some(state))
}

/// Drop descriptors excluded by an active pre-release state.
///
/// Returns the state only when it is active.
pub fn apply_pre_state(
    pre_state: Option<PreReleaseState>,
    changesets: Vec<ChangeDescriptor>,
) -> ChangesetState {
    match pre_state {
        Some(state) if state.is_active() => {
            let changesets = changesets
                .into_iter()
                .filter(|c| !state.changesets.contains(&c.id))
                .collect();
            ChangesetState {
                pre_state: Some(state),
                changesets,
            }
        }
        _ => ChangesetState {
            pre_state: None,
            changesets,
        },
    }
}

/// Read pending descriptors and pre-release state together.
pub fn resolve_state(root: &Utf8Path) -> ChangesetResult<ChangesetState> {
    let pre_state = read_pre_state(root)?;
    let changesets = read_changesets(root)?;
    Ok(apply_pre_state(pre_state, changesets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn root(tmp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap()
    }

    fn write(root: &Utf8Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn descriptor(id: &str) -> ChangeDescriptor {
        ChangeDescriptor {
            id: id.to_string(),
            releases: Vec::new(),
            summary: String::new(),
        }
    }

    fn pre(mode: PreMode, excluded: &[&str]) -> PreReleaseState {
        PreReleaseState {
            mode,
            tag: "beta".to_string(),
            initial_versions: BTreeMap::new(),
            changesets: excluded.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn reads_descriptors_sorted_and_skips_readme() {
        let tmp = TempDir::new().unwrap();
        let root = root(&tmp);
        write(&root, ".changeset/README.md", "# Changesets\n");
        write(&root, ".changeset/config.json", "{}");
        write(
            &root,
            ".changeset/zany-cats.md",
            "---\n\"@scope/a\": minor\nb: patch\n---\n\nAdd things\n",
        );
        write(&root, ".changeset/brave-dogs.md", "---\nb: major\n---\nBreak b\n");

        let found = read_changesets(&root).unwrap();
        let ids: Vec<_> = found.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["brave-dogs", "zany-cats"]);
        assert_eq!(
            found[1].releases,
            vec![
                Release {
                    name: "@scope/a".into(),
                    level: BumpLevel::Minor
                },
                Release {
                    name: "b".into(),
                    level: BumpLevel::Patch
                },
            ]
        );
        assert_eq!(found[1].summary, "Add things");
    }

    #[test]
    fn empty_front_matter_is_allowed() {
        let tmp = TempDir::new().unwrap();
        let root = root(&tmp);
        write(&root, ".changeset/empty.md", "---\n---\n");
        let found = read_changesets(&root).unwrap();
        assert!(found[0].releases.is_empty());
    }

    #[test]
    fn missing_front_matter_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let root = root(&tmp);
        write(&root, ".changeset/bad.md", "no front matter here\n");
        let err = read_changesets(&root).unwrap_err();
        assert!(matches!(err, ChangesetError::MissingFrontMatter { .. }));
    }

    #[test]
    fn missing_directory_means_nothing_pending() {
        let tmp = TempDir::new().unwrap();
        assert!(read_changesets(&root(&tmp)).unwrap().is_empty());
        assert!(read_pre_state(&root(&tmp)).unwrap().is_none());
    }

    #[test]
    fn reads_pre_json() {
        let tmp = TempDir::new().unwrap();
        let root = root(&tmp);
        write(
            &root,
            ".changeset/pre.json",
            r#"{"mode":"pre","tag":"next","initialVersions":{"a":"1.0.0"},"changesets":["x"]}"#,
        );
        let state = read_pre_state(&root).unwrap().unwrap();
        assert!(state.is_active());
        assert_eq!(state.tag, "next");
        assert!(state.changesets.contains("x"));
        assert_eq!(state.initial_versions.get("a").map(String::as_str), Some("1.0.0"));
    }

    #[test]
    fn active_pre_state_filters_excluded_ids() {
        let state = apply_pre_state(
            Some(pre(PreMode::Pre, &["id1"])),
            vec![descriptor("id1"), descriptor("id2")],
        );
        let ids: Vec<_> = state.changesets.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["id2"]);
        assert_eq!(state.pre_state.map(|s| s.tag), Some("beta".to_string()));
    }

    #[test]
    fn exit_mode_is_not_active() {
        let state = apply_pre_state(
            Some(pre(PreMode::Exit, &["id1"])),
            vec![descriptor("id1"), descriptor("id2")],
        );
        assert!(state.pre_state.is_none());
        assert_eq!(state.changesets.len(), 2);
    }

    #[test]
    fn resolve_state_combines_both_reads() {
        let tmp = TempDir::new().unwrap();
        let root = root(&tmp);
        write(&root, ".changeset/a.md", "---\nx: patch\n---\n");
        write(&root, ".changeset/b.md", "---\nx: minor\n---\n");
        write(
            &root,
            ".changeset/pre.json",
            r#"{"mode":"pre","tag":"rc","changesets":["a"]}"#,
        );
        let state = resolve_state(&root).unwrap();
        assert_eq!(state.changesets.len(), 1);
        assert_eq!(state.changesets[0].id, "b");
    }
}
