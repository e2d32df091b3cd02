//! Git operations for the release branch workflow.
//!
//! Every operation shells out to the `git` on PATH and runs with the CI
//! runner's own credentials and hooks. The orchestrator only sees the [`Vcs`]
//! trait.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "push").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// How `git reset` treats the index and working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetMode {
    /// Discard index and working tree changes.
    #[default]
    Hard,
    /// Keep index and working tree.
    Soft,
    /// Reset the index, keep the working tree.
    Mixed,
}

impl ResetMode {
    const fn flag(self) -> &'static str {
        match self {
            Self::Hard => "--hard",
            Self::Soft => "--soft",
            Self::Mixed => "--mixed",
        }
    }
}

/// Version control operations the release workflow needs.
pub trait Vcs {
    /// Set the committer identity for this repository.
    fn configure_user(&mut self, name: Option<&str>, email: Option<&str>) -> GitResult<()>;

    /// Switch to `branch`, creating it from HEAD if it does not exist.
    fn checkout_branch(&mut self, branch: &str) -> GitResult<()>;

    /// Reset the current branch to `target`.
    fn reset(&mut self, target: &str, mode: ResetMode) -> GitResult<()>;

    /// Stage everything and commit with `message`.
    fn commit_all(&mut self, message: &str) -> GitResult<()>;

    /// Push HEAD to `branch` on the remote.
    fn push(&mut self, branch: &str, force: bool) -> GitResult<()>;

    /// Push all tags to the remote.
    fn push_tags(&mut self) -> GitResult<()>;

    /// Whether the working tree has no uncommitted changes.
    fn is_clean(&mut self) -> GitResult<bool>;
}

/// [`Vcs`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct SystemGit {
    root: Utf8PathBuf,
    remote: String,
}

impl SystemGit {
    /// Operate on the repository at `root`, pushing to `remote`.
    pub fn new(root: impl Into<Utf8PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            remote: remote.into(),
        }
    }

    /// The repository root.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn git(&self, args: &[&str]) -> GitResult<String> {
        git_in(&self.root, args)
    }
}

impl Vcs for SystemGit {
    #[instrument(skip(self))]
    fn configure_user(&mut self, name: Option<&str>, email: Option<&str>) -> GitResult<()> {
        if let Some(name) = name {
            self.git(&["config", "user.name", name])?;
        }
        if let Some(email) = email {
            self.git(&["config", "user.email", email])?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn checkout_branch(&mut self, branch: &str) -> GitResult<()> {
        match self.git(&["checkout", branch]) {
            Ok(_) => {
                debug!("switched to existing branch");
                Ok(())
            }
            Err(GitError::Command { stderr, .. }) => {
                debug!(%stderr, "branch missing, creating it");
                self.git(&["checkout", "-b", branch]).map(|_| ())
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    fn reset(&mut self, target: &str, mode: ResetMode) -> GitResult<()> {
        self.git(&["reset", mode.flag(), target]).map(|_| ())
    }

    #[instrument(skip(self))]
    fn commit_all(&mut self, message: &str) -> GitResult<()> {
        self.git(&["add", "."])?;
        self.git(&["commit", "-m", message])?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn push(&mut self, branch: &str, force: bool) -> GitResult<()> {
        let refspec = format!("HEAD:{branch}");
        let mut args = vec!["push", self.remote.as_str(), refspec.as_str()];
        if force {
            args.push("--force");
        }
        self.git(&args).map(|_| ())
    }

    #[instrument(skip(self))]
    fn push_tags(&mut self) -> GitResult<()> {
        self.git(&["push", self.remote.as_str(), "--tags"]).map(|_| ())
    }

    #[instrument(skip(self))]
    fn is_clean(&mut self) -> GitResult<bool> {
        let output = self.git(&["status", "--porcelain"])?;
        let clean = output.trim().is_empty();
        debug!(clean, "working tree status");
        Ok(clean)
    }
}

/// Check if `dir` is inside a git work tree.
#[instrument]
pub fn is_inside_repo(dir: &Utf8Path) -> GitResult<bool> {
    match git_in(dir, &["rev-parse", "--is-inside-work-tree"]) {
        Ok(output) => Ok(output.trim() == "true"),
        Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Run a git command in `dir` and return its stdout.
fn git_in(dir: &Utf8Path, args: &[&str]) -> GitResult<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir.as_std_path())
        .output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }

        Err(GitError::Command {
            command: args.first().unwrap_or(&"").to_string(),
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // These tests need a `git` binary; they skip quietly without one.

    fn init_repo() -> Option<(TempDir, SystemGit)> {
        which::which("git").ok()?;
        let tmp = TempDir::new().ok()?;
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).ok()?;
        git_in(&root, &["init", "--quiet", "--initial-branch=main"]).ok()?;
        let mut repo = SystemGit::new(root, "origin");
        repo.configure_user(Some("Release Bot"), Some("bot@example.com"))
            .ok()?;
        git_in(repo.root(), &["config", "commit.gpgsign", "false"]).ok()?;
        Some((tmp, repo))
    }

    #[test]
    fn reset_mode_flags() {
        assert_eq!(ResetMode::Hard.flag(), "--hard");
        assert_eq!(ResetMode::Soft.flag(), "--soft");
        assert_eq!(ResetMode::Mixed.flag(), "--mixed");
        assert_eq!(ResetMode::default(), ResetMode::Hard);
    }

    #[test]
    fn configure_user_is_repo_local() {
        let Some((_tmp, repo)) = init_repo() else {
            return;
        };
        let name = git_in(repo.root(), &["config", "--local", "user.name"]).unwrap();
        assert_eq!(name.trim(), "Release Bot");
    }

    #[test]
    fn commit_all_cleans_tree() {
        let Some((_tmp, mut repo)) = init_repo() else {
            return;
        };
        fs::write(repo.root().join("file.txt"), "hi").unwrap();
        assert!(!repo.is_clean().unwrap());

        repo.commit_all("Version Packages").unwrap();
        assert!(repo.is_clean().unwrap());

        let subject = git_in(repo.root(), &["log", "-1", "--format=%s"]).unwrap();
        assert_eq!(subject.trim(), "Version Packages");
    }

    #[test]
    fn checkout_branch_creates_then_reuses() {
        let Some((_tmp, mut repo)) = init_repo() else {
            return;
        };
        fs::write(repo.root().join("a.txt"), "a").unwrap();
        repo.commit_all("init").unwrap();

        repo.checkout_branch("changeset-release/main").unwrap();
        let head = git_in(repo.root(), &["rev-parse", "--abbrev-ref", "HEAD"]).unwrap();
        assert_eq!(head.trim(), "changeset-release/main");

        repo.checkout_branch("main").unwrap();
        repo.checkout_branch("changeset-release/main").unwrap();
        let head = git_in(repo.root(), &["rev-parse", "--abbrev-ref", "HEAD"]).unwrap();
        assert_eq!(head.trim(), "changeset-release/main");
    }

    #[test]
    fn hard_reset_discards_commits() {
        let Some((_tmp, mut repo)) = init_repo() else {
            return;
        };
        fs::write(repo.root().join("a.txt"), "a").unwrap();
        repo.commit_all("first").unwrap();
        fs::write(repo.root().join("b.txt"), "b").unwrap();
        repo.commit_all("second").unwrap();

        repo.reset("HEAD~1", ResetMode::Hard).unwrap();
        assert!(!repo.root().join("b.txt").exists());
    }

    #[test]
    fn push_without_remote_fails_with_command_error() {
        let Some((_tmp, mut repo)) = init_repo() else {
            return;
        };
        fs::write(repo.root().join("a.txt"), "a").unwrap();
        repo.commit_all("init").unwrap();
        let err = repo.push("main", true).unwrap_err();
        assert!(matches!(err, GitError::Command { ref command, .. } if command == "push"));
    }

    #[test]
    fn outside_repo_is_detected() {
        if which::which("git").is_err() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap();
        assert!(!is_inside_repo(dir).unwrap());
    }
}
