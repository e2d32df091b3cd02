//! Bitbucket Cloud pull request host.
//!
//! A [`BitbucketSession`] is created once per run and passed by reference.
//! [`PullRequestHost::connect`] performs the OAuth client-credentials
//! exchange; the CRUD calls only ever use the token obtained there and fail
//! with [`HostError::NotConnected`] otherwise.

use std::time::{Duration, Instant};

use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Default REST API root.
pub const DEFAULT_API_BASE: &str = "https://api.bitbucket.org/2.0";

/// Default OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://bitbucket.org/site/oauth2/access_token";

/// Environment variable holding the OAuth consumer key.
pub const CLIENT_ID_VAR: &str = "BITBUCKET_CLIENT_ID";

/// Environment variable holding the OAuth consumer secret.
pub const CLIENT_SECRET_VAR: &str = "BITBUCKET_CLIENT_SECRET";

/// Environment variable naming the `workspace/repo` slug.
pub const REPO_VAR: &str = "BITBUCKET_REPO_FULL_NAME";

/// Errors from the pull request host.
#[derive(Error, Debug)]
pub enum HostError {
    /// A required credential or setting is missing.
    #[error("missing Bitbucket setting: {0} is not set")]
    MissingSetting(&'static str),

    /// A CRUD call was made before a successful [`PullRequestHost::connect`].
    #[error("not connected to the pull request host")]
    NotConnected,

    /// Token exchange failed.
    #[error("failed to authenticate with Bitbucket: {0}")]
    Auth(String),

    /// The HTTP request itself failed.
    #[error("request to Bitbucket failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Bitbucket answered with an error status.
    #[error("Bitbucket returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body.
        message: String,
    },
}

/// Result alias for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Handle to an existing pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    /// Host-assigned id.
    pub id: u64,
}

/// Fields for a new pull request.
#[derive(Debug, Clone, Copy)]
pub struct PullRequestDraft<'a> {
    /// Title.
    pub title: &'a str,
    /// Markdown description.
    pub description: &'a str,
    /// Branch with the changes.
    pub source: &'a str,
    /// Branch to merge into.
    pub destination: &'a str,
}

/// Pull request CRUD against a code host.
pub trait PullRequestHost {
    /// Obtain or refresh credentials.
    fn connect(&mut self) -> HostResult<()>;

    /// First open pull request from `source` into `destination`.
    fn find_open(&self, source: &str, destination: &str) -> HostResult<Option<PullRequestRef>>;

    /// Open a new pull request.
    fn create(&self, draft: &PullRequestDraft<'_>) -> HostResult<PullRequestRef>;

    /// Replace the title and description of `pr`.
    fn update(&self, pr: &PullRequestRef, title: &str, description: &str) -> HostResult<()>;
}

/// Where and how to reach Bitbucket.
#[derive(Debug, Clone)]
pub struct BitbucketSettings {
    /// REST API root, e.g. [`DEFAULT_API_BASE`].
    pub api_base: String,
    /// OAuth token endpoint.
    pub token_url: String,
    /// `workspace/repo` slug.
    pub repository: String,
    /// OAuth consumer key.
    pub client_id: String,
    /// OAuth consumer secret.
    pub client_secret: String,
}

impl BitbucketSettings {
    /// Build settings from configured values and an environment lookup.
    ///
    /// `repository` from configuration wins over [`REPO_VAR`].
    pub fn resolve(
        api_base: Option<&str>,
        token_url: Option<&str>,
        repository: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> HostResult<Self> {
        let non_empty = |name: &'static str| {
            env(name)
                .filter(|v| !v.is_empty())
                .ok_or(HostError::MissingSetting(name))
        };
        let repository = match repository {
            Some(repo) => repo.to_string(),
            None => non_empty(REPO_VAR)?,
        };
        Ok(Self {
            api_base: api_base.unwrap_or(DEFAULT_API_BASE).trim_end_matches('/').to_string(),
            token_url: token_url.unwrap_or(DEFAULT_TOKEN_URL).to_string(),
            repository,
            client_id: non_empty(CLIENT_ID_VAR)?,
            client_secret: non_empty(CLIENT_SECRET_VAR)?,
        })
    }

    fn pull_requests_url(&self) -> String {
        format!("{}/repositories/{}/pullrequests", self.api_base, self.repository)
    }
}

#[derive(Debug)]
struct AccessToken {
    value: String,
    expires_at: Option<Instant>,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PullRequestPage {
    #[serde(default)]
    values: Vec<PullRequestRef>,
}

/// An authenticated Bitbucket API session.
#[derive(Debug)]
pub struct BitbucketSession {
    settings: BitbucketSettings,
    client: Client,
    token: Option<AccessToken>,
}

impl BitbucketSession {
    /// Create an unconnected session.
    pub fn new(settings: BitbucketSettings) -> HostResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("changepr/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            settings,
            client,
            token: None,
        })
    }

    fn bearer(&self) -> HostResult<&str> {
        match &self.token {
            Some(token) if token.is_fresh() => Ok(&token.value),
            _ => Err(HostError::NotConnected),
        }
    }
}

impl PullRequestHost for BitbucketSession {
    #[instrument(skip(self), fields(repository = %self.settings.repository))]
    fn connect(&mut self) -> HostResult<()> {
        if self.token.as_ref().is_some_and(AccessToken::is_fresh) {
            debug!("reusing access token");
            return Ok(());
        }

        let response = self
            .client
            .post(&self.settings.token_url)
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .header("Accept", "application/json")
            .form(&[("grant_type", "client_credentials"), ("scopes", "repository")])
            .send()
            .map_err(|e| HostError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(HostError::Auth(format!(
                "{status}: {}",
                error_message(&body)
            )));
        }

        let token: TokenResponse = response.json().map_err(|e| HostError::Auth(e.to_string()))?;
        self.token = Some(AccessToken {
            value: token.access_token,
            // Treated as expired one minute early.
            expires_at: token
                .expires_in
                .map(|secs| Instant::now() + Duration::from_secs(secs.saturating_sub(60))),
        });
        info!("authenticated with Bitbucket");
        Ok(())
    }

    #[instrument(skip(self))]
    fn find_open(&self, source: &str, destination: &str) -> HostResult<Option<PullRequestRef>> {
        let response = self
            .client
            .get(format!("{}/", self.settings.pull_requests_url()))
            .bearer_auth(self.bearer()?)
            .header("Accept", "application/json")
            .query(&[("q", open_pull_request_query(source, destination))])
            .send()?;
        let page: PullRequestPage = check(response)?.json()?;
        let found = page.values.into_iter().next();
        debug!(?found, "open pull request lookup");
        Ok(found)
    }

    #[instrument(skip(self, draft), fields(title = draft.title))]
    fn create(&self, draft: &PullRequestDraft<'_>) -> HostResult<PullRequestRef> {
        let response = self
            .client
            .post(self.settings.pull_requests_url())
            .bearer_auth(self.bearer()?)
            .header("Accept", "application/json")
            .json(&create_body(draft))
            .send()?;
        let created: PullRequestRef = check(response)?.json()?;
        info!(id = created.id, "created pull request");
        Ok(created)
    }

    #[instrument(skip(self, description))]
    fn update(&self, pr: &PullRequestRef, title: &str, description: &str) -> HostResult<()> {
        let response = self
            .client
            .put(format!("{}/{}", self.settings.pull_requests_url(), pr.id))
            .bearer_auth(self.bearer()?)
            .header("Accept", "application/json")
            .json(&update_body(title, description))
            .send()?;
        check(response)?;
        info!(id = pr.id, "updated pull request");
        Ok(())
    }
}

fn check(response: Response) -> HostResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(HostError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Query selecting open pull requests between two branches.
pub fn open_pull_request_query(source: &str, destination: &str) -> String {
    format!(
        r#"destination.branch.name="{destination}" AND source.branch.name="{source}" AND state="OPEN""#
    )
}

fn create_body(draft: &PullRequestDraft<'_>) -> Value {
    json!({
        "title": draft.title,
        "description": draft.description,
        "source": { "branch": { "name": draft.source } },
        "destination": { "branch": { "name": draft.destination } },
        "close_source_branch": true,
    })
}

fn update_body(title: &str, description: &str) -> Value {
    json!({ "title": title, "description": description })
}

/// Pull the human-readable message out of a Bitbucket error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
