//! Error types for changepr-core.
//!
//! Each module owns its error enum; [`ReleaseError`] gathers them for the
//! orchestrator so the CLI sees a single type.

use thiserror::Error;

use crate::bitbucket::HostError;
use crate::changeset::ChangesetError;
use crate::git::GitError;
use crate::npm::NpmAuthError;
use crate::process::ProcessError;
use crate::release_body::ReleaseBodyError;
use crate::tool::ToolError;
use crate::workspace::WorkspaceError;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors from a release run.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// The repository or invocation is set up in a way the run cannot handle.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A required tool is missing.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// An external command failed.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// A git operation failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Workspace manifests could not be read.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// Change descriptors could not be read.
    #[error(transparent)]
    Changeset(#[from] ChangesetError),

    /// The pull request body could not be built.
    #[error(transparent)]
    ReleaseBody(#[from] ReleaseBodyError),

    /// The pull request host rejected the session.
    #[error(transparent)]
    Host(#[from] HostError),

    /// npm credentials could not be written.
    #[error(transparent)]
    NpmAuth(#[from] NpmAuthError),
}

impl ReleaseError {
    /// Whether this is a setup problem rather than a runtime failure.
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::Tool(ToolError::ChangesetsCliMissing { .. })
                | Self::Host(HostError::MissingSetting(_))
        )
    }
}

/// Result alias for release runs.
pub type ReleaseResult<T> = Result<T, ReleaseError>;
