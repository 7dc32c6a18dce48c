//! Detail-fetch capability seam.

use async_trait::async_trait;
use pulldeck_core::error::FetchError;
use pulldeck_core::pr::{PrDetails, PullRequest};

/// The expensive per-record upstream lookup.
///
/// The orchestrator is agnostic to the implementation (HTTP client, SDK,
/// mock); it only requires typed errors on failure. Cancellation and the
/// per-item deadline are imposed by the orchestrator around the call, so
/// implementations must tolerate being dropped mid-flight.
#[async_trait]
pub trait DetailFetcher: Send + Sync + 'static {
    async fn fetch_details(&self, pr: &PullRequest) -> Result<PrDetails, FetchError>;
}
