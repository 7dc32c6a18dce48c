//! Job handler seam for the worker pool.

use async_trait::async_trait;
use pulldeck_core::error::PoolError;
use std::future::Future;

/// Result of one job. Worker-function failures and pool-level failures
/// (cancellation, shutdown races) share this shape so callers see one
/// uniform result type.
pub type JobResult<Out> = Result<Out, PoolError>;

/// Caller-supplied function executed by pool workers.
///
/// Implementations must not panic; a failing job reports through the
/// returned `JobResult` and never crosses the job boundary as a fault.
#[async_trait]
pub trait JobHandler<In, Out>: Send + Sync + 'static
where
    In: Send + 'static,
    Out: Send + 'static,
{
    async fn handle(&self, input: In) -> JobResult<Out>;
}

/// Adapter that lets a plain async closure act as a [`JobHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<In, Out, F, Fut> JobHandler<In, Out> for FnHandler<F>
where
    In: Send + 'static,
    Out: Send + 'static,
    F: Fn(In) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = JobResult<Out>> + Send,
{
    async fn handle(&self, input: In) -> JobResult<Out> {
        (self.0)(input).await
    }
}
