//! GitHub REST client.
//!
//! Fetches `GET /repos/{owner}/{repo}/pulls/{number}` and maps the response
//! onto [`PrDetails`]. Auth token resolution order: explicit config value,
//! then `GITHUB_TOKEN`, then `GH_TOKEN`; a missing token is a construction
//! error, not a per-request one, so the dashboard fails fast at startup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulldeck_core::config::AuthConfig;
use pulldeck_core::error::FetchError;
use pulldeck_core::pr::{PrDetails, PullRequest};
use pulldeck_enhance::DetailFetcher;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("pulldeck/", env!("CARGO_PKG_VERSION"));

/// Env vars consulted when no token is configured, in order.
const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// GitHub REST API client implementing [`DetailFetcher`].
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GithubClient {
    /// Build a client, resolving the auth token eagerly.
    pub fn new(auth: &AuthConfig) -> Result<Self, FetchError> {
        let token = resolve_token(auth.token.as_deref())?;
        let http = reqwest::Client::builder()
            // Transport-level ceiling; the orchestrator applies the real
            // per-item deadline around the whole call.
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Http {
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
        })
    }

    /// Point the client at a different API root (GitHub Enterprise, test
    /// servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn detail_url(&self, pr: &PullRequest) -> String {
        format!("{}/repos/{}/pulls/{}", self.base_url, pr.repo, pr.number)
    }
}

#[async_trait]
impl DetailFetcher for GithubClient {
    async fn fetch_details(&self, pr: &PullRequest) -> Result<PrDetails, FetchError> {
        let url = self.detail_url(pr);
        tracing::debug!(id = %pr.id(), url = %url, "fetching pull request details");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, GITHUB_MEDIA_TYPE)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| FetchError::Http {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiError>()
                .await
                .map(|body| body.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("unrecognized status")
                        .to_string()
                });
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: PullDetailResponse =
            response.json().await.map_err(|e| FetchError::InvalidResponse {
                reason: e.to_string(),
            })?;
        Ok(body.into())
    }
}

fn resolve_token(configured: Option<&str>) -> Result<String, FetchError> {
    resolve_token_with(configured, |name| std::env::var(name).ok())
}

fn resolve_token_with(
    configured: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, FetchError> {
    if let Some(token) = configured.filter(|t| !t.trim().is_empty()) {
        return Ok(token.to_string());
    }
    for name in TOKEN_ENV_VARS {
        if let Some(token) = env(name).filter(|t| !t.trim().is_empty()) {
            return Ok(token);
        }
    }
    Err(FetchError::MissingToken)
}

/// Subset of the GitHub pull request object the dashboard consumes.
/// Unlisted fields are ignored on deserialization.
#[derive(Debug, Deserialize)]
struct PullDetailResponse {
    additions: u64,
    deletions: u64,
    changed_files: u64,
    commits: u64,
    comments: u64,
    review_comments: u64,
    mergeable: Option<bool>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    merged: bool,
    updated_at: DateTime<Utc>,
}

impl From<PullDetailResponse> for PrDetails {
    fn from(body: PullDetailResponse) -> Self {
        Self {
            additions: body.additions,
            deletions: body.deletions,
            changed_files: body.changed_files,
            commits: body.commits,
            comments: body.comments,
            review_comments: body.review_comments,
            mergeable: body.mergeable,
            draft: body.draft,
            merged: body.merged,
            updated_at: body.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}
