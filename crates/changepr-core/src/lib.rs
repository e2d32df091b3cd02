//! Core library for changepr.
//!
//! changepr keeps a "Version Packages" pull request open on Bitbucket for a
//! JavaScript monorepo that records pending releases as changeset files, and
//! publishes packages once that pull request is merged.
//!
//! # Modules
//!
//! - [`bitbucket`] - Bitbucket Cloud pull request client
//! - [`changelog`] - Per-version changelog extraction
//! - [`changeset`] - Pending change descriptors and pre-release state
//! - [`config`] - Configuration loading and management
//! - [`error`] - Error types and result aliases
//! - [`git`] - Git operations for release workflows
//! - [`markdown`] - Block-level Markdown model
//! - [`npm`] - npm registry credentials
//! - [`process`] - External command execution
//! - [`release`] - Release orchestrator
//! - [`release_body`] - Pull request body assembly
//! - [`severity`] - Bump levels and changelog heading classification
//! - [`tool`] - Locating the changesets CLI
//! - [`workspace`] - Workspace package discovery
//!
//! # Example
//!
//! ```
//! use changepr_core::{BumpLevel, changelog};
//!
//! let text = "# pkg\n\n## 2.0.0\n\n### Major Changes\n\n- Drop Node 16\n\n## 1.4.0\n\n- Older";
//! let entry = changelog::extract(text, "2.0.0");
//! assert_eq!(entry.content, "### Major Changes\n\n- Drop Node 16");
//! assert_eq!(entry.highest_level, BumpLevel::Major);
//! ```
#![deny(unsafe_code)]

pub mod bitbucket;

pub mod changelog;

pub mod changeset;

pub mod config;

pub mod error;

pub mod git;

pub mod markdown;

pub mod npm;

pub mod process;

pub mod release;

pub mod release_body;

pub mod severity;

pub mod tool;

pub mod workspace;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult, ReleaseError, ReleaseResult};

pub use severity::BumpLevel;

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
