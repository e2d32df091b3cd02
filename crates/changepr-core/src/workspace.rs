//! JavaScript workspace discovery.
//!
//! Reads the root `package.json` (and `pnpm-workspace.yaml` when present) to
//! find every package in the repository along with its current version. The
//! result is a fresh snapshot; callers re-read after running commands that
//! rewrite manifests.

use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from reading workspace manifests.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// A manifest could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// `package.json` is not valid JSON for our purposes.
    #[error("invalid package manifest {path}: {source}")]
    Manifest {
        /// The manifest path.
        path: Utf8PathBuf,
        /// Parse error.
        source: serde_json::Error,
    },

    /// `pnpm-workspace.yaml` could not be parsed.
    #[error("invalid pnpm workspace file {path}: {message}")]
    PnpmWorkspace {
        /// The workspace file path.
        path: Utf8PathBuf,
        /// Parse error text.
        message: String,
    },

    /// A workspace glob is malformed.
    #[error("invalid workspace pattern `{pattern}`: {message}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// Why it failed.
        message: String,
    },

    /// A package manifest lacks a required field.
    #[error("{path} is missing the `{field}` field")]
    MissingField {
        /// The manifest path.
        path: Utf8PathBuf,
        /// Name of the missing field.
        field: &'static str,
    },
}

/// Result alias for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Which tool manages the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceTool {
    /// Single package at the repository root.
    Root,
    /// npm workspaces.
    Npm,
    /// Yarn workspaces.
    Yarn,
    /// pnpm workspaces.
    Pnpm,
}

impl std::fmt::Display for WorkspaceTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::Npm => write!(f, "npm"),
            Self::Yarn => write!(f, "yarn"),
            Self::Pnpm => write!(f, "pnpm"),
        }
    }
}

/// One package in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
    /// Absolute package directory.
    pub dir: Utf8PathBuf,
    /// Package name from `package.json`.
    pub name: String,
    /// Current version string.
    pub version: String,
    /// Whether the package is marked `private`.
    pub private: bool,
}

/// All packages found under a workspace root.
#[derive(Debug, Clone, Serialize)]
pub struct Workspace {
    /// Managing tool.
    pub tool: WorkspaceTool,
    /// The root directory.
    pub root: Utf8PathBuf,
    /// Packages sorted by directory.
    pub packages: Vec<PackageInfo>,
}

impl Workspace {
    /// Map from package directory to its current version.
    pub fn versions_by_directory(&self) -> BTreeMap<Utf8PathBuf, String> {
        self.packages
            .iter()
            .map(|pkg| (pkg.dir.clone(), pkg.version.clone()))
            .collect()
    }

    /// Packages whose version differs from the `before` snapshot.
    ///
    /// Packages absent from the snapshot count as changed.
    pub fn changed_packages(&self, before: &BTreeMap<Utf8PathBuf, String>) -> Vec<PackageInfo> {
        self.packages
            .iter()
            .filter(|pkg| before.get(&pkg.dir) != Some(&pkg.version))
            .cloned()
            .collect()
    }

    /// Look up a package by name.
    pub fn find(&self, name: &str) -> Option<&PackageInfo> {
        self.packages.iter().find(|pkg| pkg.name == name)
    }
}

#[derive(Debug, Deserialize)]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    private: bool,
    workspaces: Option<WorkspacesField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WorkspacesField {
    List(Vec<String>),
    Object {
        #[serde(default)]
        packages: Vec<String>,
    },
}

impl WorkspacesField {
    fn into_patterns(self) -> Vec<String> {
        match self {
            Self::List(patterns) | Self::Object { packages: patterns } => patterns,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PnpmWorkspaceFile {
    #[serde(default)]
    packages: Vec<String>,
}

/// Read every package in the workspace rooted at `root`.
#[instrument(fields(root = %root))]
pub fn read_workspace(root: &Utf8Path) -> WorkspaceResult<Workspace> {
    let manifest_path = root.join("package.json");
    let mut manifest = read_manifest(&manifest_path)?;

    let pnpm_path = root.join("pnpm-workspace.yaml");
    let (tool, patterns) = if pnpm_path.is_file() {
        (WorkspaceTool::Pnpm, read_pnpm_patterns(&pnpm_path)?)
    } else if let Some(field) = manifest.workspaces.take() {
        let tool = if root.join("package-lock.json").is_file() {
            WorkspaceTool::Npm
        } else {
            WorkspaceTool::Yarn
        };
        (tool, field.into_patterns())
    } else {
        (WorkspaceTool::Root, Vec::new())
    };

    let packages = if tool == WorkspaceTool::Root {
        vec![package_info(root, &manifest_path, manifest)?]
    } else {
        let mut packages = Vec::new();
        for dir in expand_patterns(root, &patterns)? {
            let path = dir.join("package.json");
            if !path.is_file() {
                continue;
            }
            packages.push(package_info(&dir, &path, read_manifest(&path)?)?);
        }
        packages
    };

    debug!(%tool, count = packages.len(), "read workspace");
    Ok(Workspace {
        tool,
        root: root.to_path_buf(),
        packages,
    })
}

fn read_text(path: &Utf8Path) -> WorkspaceResult<String> {
    fs::read_to_string(path).map_err(|source| WorkspaceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_manifest(path: &Utf8Path) -> WorkspaceResult<PackageJson> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|source| WorkspaceError::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

fn read_pnpm_patterns(path: &Utf8Path) -> WorkspaceResult<Vec<String>> {
    let text = read_text(path)?;
    let file: PnpmWorkspaceFile =
        serde_saphyr::from_str(&text).map_err(|e| WorkspaceError::PnpmWorkspace {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(file.packages)
}

fn package_info(
    dir: &Utf8Path,
    manifest_path: &Utf8Path,
    manifest: PackageJson,
) -> WorkspaceResult<PackageInfo> {
    let name = manifest.name.ok_or_else(|| WorkspaceError::MissingField {
        path: manifest_path.to_path_buf(),
        field: "name",
    })?;
    Ok(PackageInfo {
        dir: dir.to_path_buf(),
        name,
        // Unversioned private packages are legal in workspaces.
        version: manifest.version.unwrap_or_default(),
        private: manifest.private,
    })
}

/// Expand workspace globs into sorted, de-duplicated package directories.
///
/// Patterns starting with `!` exclude directories matched by earlier ones.
fn expand_patterns(root: &Utf8Path, patterns: &[String]) -> WorkspaceResult<Vec<Utf8PathBuf>> {
    let mut excludes = Vec::new();
    for pattern in patterns.iter().filter_map(|p| p.strip_prefix('!')) {
        let compiled = glob::Pattern::new(pattern.trim_end_matches('/')).map_err(|e| {
            WorkspaceError::Pattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            }
        })?;
        excludes.push(compiled);
    }

    let escaped_root = Utf8PathBuf::from(glob::Pattern::escape(root.as_str()));
    let mut dirs = Vec::new();
    for pattern in patterns.iter().filter(|p| !p.starts_with('!')) {
        let full = escaped_root.join(pattern.trim_end_matches('/'));
        let matches = glob::glob(full.as_str()).map_err(|e| WorkspaceError::Pattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;

        for entry in matches.filter_map(Result::ok) {
            let Ok(dir) = Utf8PathBuf::try_from(entry) else {
                continue;
            };
            if !dir.is_dir() || dir.components().any(|c| c.as_str() == "node_modules") {
                continue;
            }
            let relative = dir.strip_prefix(root).unwrap_or(&dir);
            if excludes.iter().any(|p| p.matches(relative.as_str())) {
                debug!(dir = %relative, "excluded by workspace pattern");
                continue;
            }
            dirs.push(dir);
        }
    }

    dirs.sort();
    dirs.dedup();
    Ok(dirs)
}
