//! Locating external tools.
//!
//! The default version command runs the changesets CLI installed in the
//! workspace's `node_modules`, picking the subcommand by the installed
//! version.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from resolving tools.
#[derive(Error, Debug)]
pub enum ToolError {
    /// `@changesets/cli` is not installed anywhere above `cwd`.
    #[error("Have you forgotten to install `@changesets/cli` in \"{cwd}\"?")]
    ChangesetsCliMissing {
        /// Directory the search started from.
        cwd: Utf8PathBuf,
    },

    /// The CLI's `package.json` could not be read.
    #[error("failed to read {path}: {message}")]
    Manifest {
        /// The manifest path.
        path: Utf8PathBuf,
        /// What went wrong.
        message: String,
    },
}

/// Result alias for tool resolution.
pub type ToolResult<T> = Result<T, ToolError>;

/// A resolved program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to run.
    pub program: String,
    /// Its arguments.
    pub args: Vec<String>,
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CliManifest {
    version: String,
}

/// Find `node_modules/@changesets/cli` walking up from `cwd`.
pub fn find_changesets_cli(cwd: &Utf8Path) -> Option<Utf8PathBuf> {
    cwd.ancestors()
        .map(|dir| dir.join("node_modules").join("@changesets").join("cli"))
        .find(|dir| dir.join("package.json").is_file())
}

/// The version command used when none is configured.
///
/// Runs `node <cli>/bin.js version`, or `bump` for CLIs older than 2.0.0.
#[instrument(fields(cwd = %cwd))]
pub fn resolve_version_command(cwd: &Utf8Path) -> ToolResult<Invocation> {
    let cli_dir = find_changesets_cli(cwd).ok_or_else(|| ToolError::ChangesetsCliMissing {
        cwd: cwd.to_path_buf(),
    })?;
    let manifest_path = cli_dir.join("package.json");
    let text = fs::read_to_string(&manifest_path).map_err(|e| ToolError::Manifest {
        path: manifest_path.clone(),
        message: e.to_string(),
    })?;
    let manifest: CliManifest = serde_json::from_str(&text).map_err(|e| ToolError::Manifest {
        path: manifest_path.clone(),
        message: e.to_string(),
    })?;
    let installed = Version::parse(&manifest.version).map_err(|e| ToolError::Manifest {
        path: manifest_path.clone(),
        message: format!("invalid version `{}`: {e}", manifest.version),
    })?;

    let subcommand = version_subcommand(&installed);
    debug!(%installed, subcommand, "resolved changesets cli");
    Ok(Invocation {
        program: "node".to_string(),
        args: vec![cli_dir.join("bin.js").to_string(), subcommand.to_string()],
    })
}

fn version_subcommand(installed: &Version) -> &'static str {
    if *installed < Version::new(2, 0, 0) {
        "bump"
    } else {
        "version"
    }
}

/// Whether `program` is on `PATH`.
pub fn has_binary(program: &str) -> bool {
    which::which(program).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn install_cli(root: &Utf8Path, version: &str) {
        let dir = root.join("node_modules/@changesets/cli");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("package.json"),
            format!(r#"{{"name":"@changesets/cli","version":"{version}"}}"#),
        )
        .unwrap();
    }

    #[test]
    fn modern_cli_uses_version() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(tmp.path()).unwrap();
        install_cli(root, "2.27.1");

        let invocation = resolve_version_command(root).unwrap();
        assert_eq!(invocation.program, "node");
        assert!(invocation.args[0].ends_with("@changesets/cli/bin.js"));
        assert_eq!(invocation.args[1], "version");
    }

    #[test]
    fn old_cli_uses_bump() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(tmp.path()).unwrap();
        install_cli(root, "1.9.0");
        assert_eq!(resolve_version_command(root).unwrap().args[1], "bump");
    }

    #[test]
    fn prerelease_of_two_is_still_old() {
        assert_eq!(version_subcommand(&Version::parse("2.0.0-next.0").unwrap()), "bump");
    }

    #[test]
    fn cli_is_found_from_nested_package() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(tmp.path()).unwrap();
        install_cli(root, "2.0.0");
        let nested = root.join("packages/a");
        fs::create_dir_all(&nested).unwrap();
        assert!(find_changesets_cli(&nested).is_some());
    }

    #[test]
    fn missing_cli_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8Path::from_path(tmp.path()).unwrap();
        let err = resolve_version_command(root).unwrap_err();
        assert!(err.to_string().contains("Have you forgotten to install `@changesets/cli`"));
    }

    #[test]
    fn invocation_display() {
        let inv = Invocation {
            program: "node".into(),
            args: vec!["bin.js".into(), "version".into()],
        };
        assert_eq!(inv.to_string(), "node bin.js version");
    }
}
