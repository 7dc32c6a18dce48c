//! Enhancement orchestrator.
//!
//! Owns a worker pool specialized to per-record detail fetches, the memo map
//! of already-enhanced records, and the admission policy that keeps at most
//! one fetch in flight per identity. The identity map and the in-flight set
//! are the only shared mutable structures, guarded by a single
//! reader/writer lock held only for map access, never across a fetch.

use crate::fetcher::DetailFetcher;
use pulldeck_core::config::DashConfig;
use pulldeck_core::error::{EnhanceError, PoolError};
use pulldeck_core::pr::{EnhancedPr, PrId, PullRequest};
use pulldeck_pool::{JobHandler, JobResult, PoolConfig, WorkerPool};
use pulldeck_storage::{CacheKey, DiskCache};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Cache key for one pull request's detail fields.
pub fn details_cache_key(id: &PrId) -> CacheKey {
    CacheKey::generate("pr-details", &[&id.repo, &id.number.to_string()])
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct EnhanceConfig {
    /// Worker pool sizing; dispatch concurrency is bounded by the pool
    /// width, not by batch size.
    pub pool: PoolConfig,
    /// Deadline for one detail fetch.
    pub per_item_timeout: Duration,
    /// TTL written with cached detail entries.
    pub details_ttl: Duration,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            per_item_timeout: Duration::from_secs(10),
            details_ttl: Duration::from_secs(15 * 60),
        }
    }
}

impl EnhanceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive orchestrator tunables from the file-based dashboard config.
    pub fn from_dash(config: &DashConfig) -> Self {
        Self {
            pool: PoolConfig::default()
                .with_workers(config.worker_count)
                .with_queue_depth_multiplier(config.queue_depth_multiplier),
            per_item_timeout: config.per_item_timeout(),
            details_ttl: config.details_ttl(),
        }
    }

    /// Set the worker count.
    pub fn with_workers(mut self, count: usize) -> Self {
        self.pool = self.pool.with_workers(count);
        self
    }

    /// Set the per-item fetch deadline.
    pub fn with_per_item_timeout(mut self, timeout: Duration) -> Self {
        self.per_item_timeout = timeout;
        self
    }

    /// Set the TTL for cached detail entries.
    pub fn with_details_ttl(mut self, ttl: Duration) -> Self {
        self.details_ttl = ttl;
        self
    }
}

/// Shared mutable orchestrator state.
///
/// Invariant: an identity is never simultaneously in `enhanced` and
/// `in_flight`; both transitions happen under one write-lock acquisition.
#[derive(Debug, Default)]
struct EnhanceState {
    enhanced: HashMap<PrId, EnhancedPr>,
    in_flight: HashSet<PrId>,
}

/// Outcome of the atomic admission check.
enum Admission {
    Admitted,
    AlreadyEnhanced(EnhancedPr),
    InFlight,
}

/// Admit one identity for enhancement, atomically: a memoized record wins,
/// an in-flight duplicate is refused, otherwise the identity is marked
/// in flight before the lock is released. Two callers racing for the same
/// identity cannot both be admitted.
fn admit(state: &RwLock<EnhanceState>, id: &PrId) -> Result<Admission, EnhanceError> {
    let mut state = state.write().map_err(|_| EnhanceError::LockPoisoned)?;
    if let Some(record) = state.enhanced.get(id) {
        return Ok(Admission::AlreadyEnhanced(record.clone()));
    }
    if !state.in_flight.insert(id.clone()) {
        return Ok(Admission::InFlight);
    }
    Ok(Admission::Admitted)
}

/// Drop the in-flight mark for an identity whose job never delivered a
/// result (pool shutdown race), so a later call can retry.
fn clear_in_flight(state: &RwLock<EnhanceState>, id: &PrId) {
    let mut state = match state.write() {
        Ok(state) => state,
        Err(poisoned) => poisoned.into_inner(),
    };
    state.in_flight.remove(id);
}

fn map_pool_error(err: PoolError) -> EnhanceError {
    match err {
        PoolError::Cancelled => EnhanceError::Cancelled,
        other => {
            tracing::warn!(error = %other, "enhancement job lost to pool failure");
            EnhanceError::Cancelled
        }
    }
}

/// Pool worker: runs one enhancement end to end and settles the identity's
/// in-flight mark exactly once, on result delivery.
struct EnhanceWorker {
    fetcher: Arc<dyn DetailFetcher>,
    cache: Option<Arc<DiskCache>>,
    state: Arc<RwLock<EnhanceState>>,
    token: CancellationToken,
    per_item_timeout: Duration,
    details_ttl: Duration,
}

impl EnhanceWorker {
    async fn enhance(&self, pr: &PullRequest) -> Result<EnhancedPr, EnhanceError> {
        let id = pr.id();
        let key = details_cache_key(&id);

        if let Some(cache) = &self.cache {
            if let Some(details) = cache.get(&key) {
                tracing::debug!(id = %id, "detail cache hit");
                return Ok(EnhancedPr::new(id, details));
            }
        }

        let fetch = tokio::time::timeout(self.per_item_timeout, self.fetcher.fetch_details(pr));
        let details = tokio::select! {
            _ = self.token.cancelled() => return Err(EnhanceError::Cancelled),
            fetched = fetch => match fetched {
                Err(_) => {
                    return Err(EnhanceError::Timeout {
                        id,
                        timeout: self.per_item_timeout,
                    })
                }
                Ok(Err(source)) => return Err(EnhanceError::Fetch { id, source }),
                Ok(Ok(details)) => details,
            },
        };

        if let Some(cache) = &self.cache {
            // Availability over durability: the record is still returned and
            // memoized when the cache write fails.
            if let Err(e) = cache.set(&key, &details, self.details_ttl) {
                tracing::warn!(id = %id, error = %e, "failed to write detail cache entry");
            }
        }

        Ok(EnhancedPr::new(id, details))
    }

    /// Settle the identity: leave the in-flight set and, on success, enter
    /// the memo map, under a single write-lock acquisition.
    fn finish(&self, id: &PrId, outcome: &Result<EnhancedPr, EnhanceError>) {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.in_flight.remove(id);
        if let Ok(record) = outcome {
            state.enhanced.insert(id.clone(), record.clone());
        }
    }
}

#[async_trait::async_trait]
impl JobHandler<PullRequest, Result<EnhancedPr, EnhanceError>> for EnhanceWorker {
    async fn handle(&self, pr: PullRequest) -> JobResult<Result<EnhancedPr, EnhanceError>> {
        let id = pr.id();
        let outcome = self.enhance(&pr).await;
        self.finish(&id, &outcome);

        match &outcome {
            Ok(_) => tracing::debug!(id = %id, "enhanced"),
            Err(e) => tracing::debug!(id = %id, error = %e, "enhancement failed"),
        }
        Ok(outcome)
    }
}

/// Enhancement orchestrator.
///
/// The UI layer consumes only this surface: [`enhance_pr`](Self::enhance_pr),
/// [`enhance_prs`](Self::enhance_prs), and the non-blocking queries
/// [`is_enhanced`](Self::is_enhanced), [`enhanced_data`](Self::enhanced_data),
/// and [`is_in_flight`](Self::is_in_flight).
pub struct Enhancer {
    pool: WorkerPool<PullRequest, Result<EnhancedPr, EnhanceError>>,
    state: Arc<RwLock<EnhanceState>>,
    token: CancellationToken,
}

impl Enhancer {
    pub fn new(fetcher: Arc<dyn DetailFetcher>, config: EnhanceConfig) -> Self {
        Self::build(fetcher, None, config)
    }

    /// Build an orchestrator that consults the persistent detail cache
    /// before fetching and writes it back after a successful fetch.
    pub fn with_cache(
        fetcher: Arc<dyn DetailFetcher>,
        cache: Arc<DiskCache>,
        config: EnhanceConfig,
    ) -> Self {
        Self::build(fetcher, Some(cache), config)
    }

    fn build(
        fetcher: Arc<dyn DetailFetcher>,
        cache: Option<Arc<DiskCache>>,
        config: EnhanceConfig,
    ) -> Self {
        let state = Arc::new(RwLock::new(EnhanceState::default()));
        let token = CancellationToken::new();
        let worker = EnhanceWorker {
            fetcher,
            cache,
            state: Arc::clone(&state),
            token: token.clone(),
            per_item_timeout: config.per_item_timeout,
            details_ttl: config.details_ttl,
        };
        let pool = WorkerPool::new(config.pool, Arc::new(worker));
        Self { pool, state, token }
    }

    /// Enhance one record.
    ///
    /// Memoized hits return immediately without a fetch. Structural
    /// validation runs before any network operation. A failed fetch leaves
    /// the memo map untouched, so a later call retries; a concurrent
    /// duplicate observes [`EnhanceError::InFlight`].
    pub async fn enhance_pr(&self, pr: &PullRequest) -> Result<EnhancedPr, EnhanceError> {
        pr.validate()?;
        let id = pr.id();

        match admit(&self.state, &id)? {
            Admission::AlreadyEnhanced(record) => return Ok(record),
            Admission::InFlight => return Err(EnhanceError::InFlight { id }),
            Admission::Admitted => {}
        }

        self.pool.start();
        let handle = self.pool.submit(pr.clone()).await;
        match handle.wait().await {
            Ok(outcome) => outcome,
            Err(pool_err) => {
                // The job never ran, so the worker could not settle the mark.
                clear_in_flight(&self.state, &id);
                Err(map_pool_error(pool_err))
            }
        }
    }

    /// Enhance a batch, invoking `callback` once per item as each completes.
    ///
    /// Callback order is completion order, not submission order. One item's
    /// failure never suppresses the others. Memoized items resolve through
    /// the callback without a fetch; identities already in flight are
    /// skipped. Returns the cancellation error without enumerating further
    /// items when the orchestrator is already shut down.
    pub async fn enhance_prs<F>(
        &self,
        items: &[PullRequest],
        mut callback: F,
    ) -> Result<(), EnhanceError>
    where
        F: FnMut(Result<EnhancedPr, EnhanceError>) + Send,
    {
        let mut to_submit = Vec::new();
        for pr in items {
            if self.token.is_cancelled() {
                return Err(EnhanceError::Cancelled);
            }
            if let Err(e) = pr.validate() {
                callback(Err(e.into()));
                continue;
            }
            match admit(&self.state, &pr.id())? {
                Admission::AlreadyEnhanced(record) => callback(Ok(record)),
                Admission::InFlight => {
                    tracing::debug!(id = %pr.id(), "enhancement already in flight, skipping");
                }
                Admission::Admitted => to_submit.push(pr.clone()),
            }
        }

        if to_submit.is_empty() {
            return Ok(());
        }

        let ids: Vec<PrId> = to_submit.iter().map(PullRequest::id).collect();
        self.pool
            .process_batch_with_callback(to_submit, |index, result| match result {
                Ok(outcome) => callback(outcome),
                Err(pool_err) => {
                    clear_in_flight(&self.state, &ids[index]);
                    callback(Err(map_pool_error(pool_err)));
                }
            })
            .await;
        Ok(())
    }

    /// Whether the identity has a memoized enrichment. Never triggers work.
    pub fn is_enhanced(&self, id: &PrId) -> bool {
        self.state
            .read()
            .map(|state| state.enhanced.contains_key(id))
            .unwrap_or(false)
    }

    /// The memoized enrichment, if any. Never triggers work.
    pub fn enhanced_data(&self, id: &PrId) -> Option<EnhancedPr> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.enhanced.get(id).cloned())
    }

    /// Whether the identity is currently queued or fetching.
    pub fn is_in_flight(&self, id: &PrId) -> bool {
        self.state
            .read()
            .map(|state| state.in_flight.contains(id))
            .unwrap_or(false)
    }

    /// Shut down: stop admitting work, cancel queued jobs, and wait for the
    /// workers to exit. In-progress fetches are interrupted. Idempotent.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.pool.stop().await;
        tracing::info!("enhancement orchestrator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use pulldeck_core::error::{FetchError, ValidationError};
    use pulldeck_core::pr::PrDetails;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn record(repo: &str, number: u64) -> PullRequest {
        PullRequest {
            repo: repo.to_string(),
            number,
            title: "Speed up index rebuild".to_string(),
            author: "octocat".to_string(),
            url: format!("https://github.com/{}/pull/{}", repo, number),
            updated_at: Utc::now(),
        }
    }

    fn details(number: u64) -> PrDetails {
        PrDetails {
            additions: number * 10,
            deletions: number,
            changed_files: 3,
            commits: 2,
            comments: 1,
            review_comments: 0,
            mergeable: Some(true),
            draft: false,
            merged: false,
            updated_at: Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap(),
        }
    }

    struct MockFetcher {
        calls: AtomicUsize,
        delay: Duration,
        failures_remaining: AtomicUsize,
    }

    impl MockFetcher {
        fn new() -> Self {
            Self::with_delay(Duration::ZERO)
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay,
                failures_remaining: AtomicUsize::new(0),
            }
        }

        fn failing_times(count: usize) -> Self {
            let fetcher = Self::new();
            fetcher.failures_remaining.store(count, Ordering::SeqCst);
            fetcher
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DetailFetcher for MockFetcher {
        async fn fetch_details(&self, pr: &PullRequest) -> Result<PrDetails, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            if self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(FetchError::Http {
                    reason: "connection reset".to_string(),
                });
            }
            Ok(details(pr.number))
        }
    }

    fn enhancer(fetcher: Arc<MockFetcher>) -> Enhancer {
        Enhancer::new(fetcher, EnhanceConfig::default().with_workers(2))
    }

    #[tokio::test]
    async fn test_enhance_pr_is_idempotent() {
        let fetcher = Arc::new(MockFetcher::new());
        let enhancer = enhancer(Arc::clone(&fetcher));
        let pr = record("octo/widgets", 7);

        let first = enhancer.enhance_pr(&pr).await.unwrap();
        let second = enhancer.enhance_pr(&pr).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 1, "memoized hit must not fetch again");
        assert!(enhancer.is_enhanced(&pr.id()));
        assert_eq!(enhancer.enhanced_data(&pr.id()), Some(first));

        enhancer.shutdown().await;
    }

    #[tokio::test]
    async fn test_validation_fails_fast_without_fetch() {
        let fetcher = Arc::new(MockFetcher::new());
        let enhancer = enhancer(Arc::clone(&fetcher));
        let pr = record("not-a-slug", 7);

        let err = enhancer.enhance_pr(&pr).await.unwrap_err();
        assert!(matches!(err, EnhanceError::Validation(_)));
        assert_eq!(fetcher.calls(), 0);
        assert!(!enhancer.is_in_flight(&pr.id()));

        enhancer.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_map_untouched_and_retries() {
        let fetcher = Arc::new(MockFetcher::failing_times(1));
        let enhancer = enhancer(Arc::clone(&fetcher));
        let pr = record("octo/widgets", 7);

        let err = enhancer.enhance_pr(&pr).await.unwrap_err();
        assert!(matches!(err, EnhanceError::Fetch { .. }));
        assert!(err.is_retryable());
        assert!(!enhancer.is_enhanced(&pr.id()));
        assert!(!enhancer.is_in_flight(&pr.id()));

        let recovered = enhancer.enhance_pr(&pr).await.unwrap();
        assert_eq!(recovered.id, pr.id());
        assert_eq!(fetcher.calls(), 2);

        enhancer.shutdown().await;
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_reported_and_retryable() {
        let fetcher = Arc::new(MockFetcher::with_delay(Duration::from_millis(200)));
        let enhancer = Enhancer::new(
            Arc::clone(&fetcher) as Arc<dyn DetailFetcher>,
            EnhanceConfig::default()
                .with_workers(1)
                .with_per_item_timeout(Duration::from_millis(40)),
        );
        let pr = record("octo/widgets", 7);

        let err = enhancer.enhance_pr(&pr).await.unwrap_err();
        assert!(matches!(err, EnhanceError::Timeout { .. }));
        assert!(err.is_retryable());
        assert!(!enhancer.is_in_flight(&pr.id()));

        enhancer.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_is_refused_atomically() {
        let fetcher = Arc::new(MockFetcher::with_delay(Duration::from_millis(100)));
        let enhancer = enhancer(Arc::clone(&fetcher));
        let pr = record("octo/widgets", 7);

        let (first, second) = tokio::join!(enhancer.enhance_pr(&pr), enhancer.enhance_pr(&pr));

        // join! polls in order: the first call wins admission, the second
        // observes the in-flight mark.
        assert!(first.is_ok());
        assert!(matches!(second, Err(EnhanceError::InFlight { .. })));
        assert_eq!(fetcher.calls(), 1);

        enhancer.shutdown().await;
    }

    #[tokio::test]
    async fn test_batch_partial_failure_isolation() {
        let fetcher = Arc::new(MockFetcher::new());
        let enhancer = enhancer(Arc::clone(&fetcher));
        let items = vec![
            record("octo/widgets", 1),
            record("malformed", 2),
            record("octo/widgets", 3),
            record("octo/widgets", 4),
        ];

        let mut successes = 0usize;
        let mut validation_errors = 0usize;
        enhancer
            .enhance_prs(&items, |result| match result {
                Ok(_) => successes += 1,
                Err(EnhanceError::Validation(ValidationError::InvalidValue { .. })) => {
                    validation_errors += 1
                }
                Err(other) => panic!("unexpected error: {}", other),
            })
            .await
            .unwrap();

        assert_eq!(successes, 3, "well-formed items must all enhance");
        assert_eq!(validation_errors, 1);
        assert_eq!(fetcher.calls(), 3);

        enhancer.shutdown().await;
    }

    #[tokio::test]
    async fn test_batch_resolves_memoized_items_without_fetch() {
        let fetcher = Arc::new(MockFetcher::new());
        let enhancer = enhancer(Arc::clone(&fetcher));
        let pr = record("octo/widgets", 1);

        enhancer.enhance_pr(&pr).await.unwrap();
        assert_eq!(fetcher.calls(), 1);

        let items = vec![pr, record("octo/widgets", 2)];
        let mut seen = Vec::new();
        enhancer
            .enhance_prs(&items, |result| seen.push(result.unwrap().id.number))
            .await
            .unwrap();

        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(fetcher.calls(), 2, "memoized item must not fetch again");

        enhancer.shutdown().await;
    }

    #[tokio::test]
    async fn test_enhance_after_shutdown_is_cancellation() {
        let fetcher = Arc::new(MockFetcher::new());
        let enhancer = enhancer(Arc::clone(&fetcher));
        enhancer.shutdown().await;

        let pr = record("octo/widgets", 7);
        assert_eq!(
            enhancer.enhance_pr(&pr).await,
            Err(EnhanceError::Cancelled)
        );
        assert!(!enhancer.is_in_flight(&pr.id()));

        let batch_err = enhancer
            .enhance_prs(&[record("octo/widgets", 8)], |_| {
                panic!("no callback after shutdown")
            })
            .await
            .unwrap_err();
        assert_eq!(batch_err, EnhanceError::Cancelled);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(DiskCache::new(dir.path()).unwrap());
        let pr = record("octo/widgets", 7);
        cache
            .set(
                &details_cache_key(&pr.id()),
                &details(7),
                Duration::from_secs(600),
            )
            .unwrap();

        let fetcher = Arc::new(MockFetcher::new());
        let enhancer = Enhancer::with_cache(
            Arc::clone(&fetcher) as Arc<dyn DetailFetcher>,
            Arc::clone(&cache),
            EnhanceConfig::default().with_workers(2),
        );

        let enhanced = enhancer.enhance_pr(&pr).await.unwrap();
        assert_eq!(enhanced.details, details(7));
        assert_eq!(fetcher.calls(), 0, "cache hit must skip the network");

        enhancer.shutdown().await;
    }

    #[tokio::test]
    async fn test_successful_fetch_writes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(DiskCache::new(dir.path()).unwrap());
        let fetcher = Arc::new(MockFetcher::new());
        let enhancer = Enhancer::with_cache(
            Arc::clone(&fetcher) as Arc<dyn DetailFetcher>,
            Arc::clone(&cache),
            EnhanceConfig::default().with_workers(2),
        );

        let pr = record("octo/widgets", 7);
        enhancer.enhance_pr(&pr).await.unwrap();

        let cached: Option<PrDetails> = cache.get(&details_cache_key(&pr.id()));
        assert!(cached.is_some(), "details should be written back to cache");

        enhancer.shutdown().await;
    }

    #[tokio::test]
    async fn test_is_in_flight_during_enhancement() {
        let fetcher = Arc::new(MockFetcher::with_delay(Duration::from_millis(100)));
        let enhancer = Arc::new(enhancer(Arc::clone(&fetcher)));
        let pr = record("octo/widgets", 7);

        let task = {
            let enhancer = Arc::clone(&enhancer);
            let pr = pr.clone();
            tokio::spawn(async move { enhancer.enhance_pr(&pr).await })
        };

        sleep(Duration::from_millis(30)).await;
        assert!(enhancer.is_in_flight(&pr.id()));
        assert!(!enhancer.is_enhanced(&pr.id()));

        task.await.unwrap().unwrap();
        assert!(!enhancer.is_in_flight(&pr.id()));
        assert!(enhancer.is_enhanced(&pr.id()));

        enhancer.shutdown().await;
    }
}
