//! Pull request record types.
//!
//! A `PullRequest` is the cheap listing record the dashboard renders first.
//! `PrDetails` carries the expensive per-item fields filled in later, and
//! `EnhancedPr` is the merged result the orchestrator memoizes.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a pull request: repository slug plus number.
///
/// This is the key for the orchestrator's memo map, the in-flight set, and
/// cache key derivation. Two records with the same `PrId` refer to the same
/// upstream pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrId {
    /// Repository slug in `owner/name` form.
    pub repo: String,
    /// Pull request number within the repository.
    pub number: u64,
}

impl PrId {
    pub fn new(repo: impl Into<String>, number: u64) -> Self {
        Self {
            repo: repo.into(),
            number,
        }
    }
}

impl fmt::Display for PrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

/// Lightweight pull request record from the initial list fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Repository slug in `owner/name` form.
    pub repo: String,
    /// Pull request number within the repository.
    pub number: u64,
    pub title: String,
    pub author: String,
    /// HTML URL of the pull request.
    pub url: String,
    pub updated_at: DateTime<Utc>,
}

impl PullRequest {
    /// Identity of this record.
    pub fn id(&self) -> PrId {
        PrId::new(self.repo.clone(), self.number)
    }

    /// Check the structural preconditions required before any network
    /// operation is attempted on behalf of this record.
    ///
    /// Fails fast with a descriptive validation error when the repository
    /// slug is missing or malformed, or the number is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.repo.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing { field: "repo" });
        }
        let mut parts = self.repo.splitn(2, '/');
        let owner = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        if owner.is_empty() || name.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "repo",
                reason: format!("expected owner/name slug, got {:?}", self.repo),
            });
        }
        if self.number == 0 {
            return Err(ValidationError::InvalidValue {
                field: "number",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Expensive per-item detail fields fetched during enhancement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrDetails {
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    pub commits: u64,
    pub comments: u64,
    pub review_comments: u64,
    /// Whether the upstream considers the branch mergeable. `None` while the
    /// upstream is still computing it.
    pub mergeable: Option<bool>,
    pub draft: bool,
    pub merged: bool,
    pub updated_at: DateTime<Utc>,
}

/// A pull request merged with its enrichment fields.
///
/// Owned exclusively by the enhancement orchestrator. Written once per
/// identity per process lifetime; re-enhancement replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedPr {
    pub id: PrId,
    pub details: PrDetails,
    /// When the enrichment was produced.
    pub enhanced_at: DateTime<Utc>,
}

impl EnhancedPr {
    pub fn new(id: PrId, details: PrDetails) -> Self {
        Self {
            id,
            details,
            enhanced_at: Utc::now(),
        }
    }
}
