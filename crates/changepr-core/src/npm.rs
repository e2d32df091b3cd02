//! npm registry credentials.

use std::fs;

use camino::Utf8Path;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Default npm registry host.
pub const DEFAULT_REGISTRY: &str = "registry.npmjs.org";

/// Errors from writing npm credentials.
#[derive(Error, Debug)]
pub enum NpmAuthError {
    /// `.npmrc` could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Path of the `.npmrc`.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// What [`setup_npm_auth`] found or did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NpmrcStatus {
    /// An `.npmrc` was already present and left alone.
    Existing,
    /// A new `.npmrc` was written with the token.
    Created,
    /// No `.npmrc` and no token to write one with.
    Missing,
}

/// Ensure `<home>/.npmrc` can authenticate against `registry`.
///
/// An existing file is never touched. Otherwise a single
/// `//<registry>/:_authToken=<token>` line is written when a token is
/// available.
#[instrument(skip(token), fields(home = %home, has_token = token.is_some()))]
pub fn setup_npm_auth(
    home: &Utf8Path,
    token: Option<&str>,
    registry: &str,
) -> Result<NpmrcStatus, NpmAuthError> {
    let path = home.join(".npmrc");
    if path.exists() {
        info!("found existing .npmrc file");
        return Ok(NpmrcStatus::Existing);
    }

    let Some(token) = token.filter(|t| !t.is_empty()) else {
        warn!("no .npmrc file found and NPM_TOKEN is not set; publishing may fail");
        return Ok(NpmrcStatus::Missing);
    };

    info!("no .npmrc file found, creating one");
    fs::write(&path, auth_line(registry, token)).map_err(|source| NpmAuthError::Write {
        path: path.to_string(),
        source,
    })?;
    Ok(NpmrcStatus::Created)
}

fn auth_line(registry: &str, token: &str) -> String {
    let host = registry
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("//")
        .trim_end_matches('/');
    format!("//{host}/:_authToken={token}")
}
