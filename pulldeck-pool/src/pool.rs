//! Fixed-size worker pool over a bounded job queue.
//!
//! Workers pull jobs from a shared bounded mpsc queue until the pool's
//! cancellation token fires. The bounded queue provides natural
//! backpressure: producers that outrun the workers suspend on `submit`
//! instead of growing memory without limit.

use crate::handler::{JobHandler, JobResult};
use pulldeck_core::error::PoolError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers, fixed at construction.
    pub worker_count: usize,
    /// Job queue depth as a multiple of the worker count.
    pub queue_depth_multiplier: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_depth_multiplier: 2,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count.
    pub fn with_workers(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the queue depth multiplier.
    pub fn with_queue_depth_multiplier(mut self, multiplier: usize) -> Self {
        self.queue_depth_multiplier = multiplier;
        self
    }

    fn queue_depth(&self) -> usize {
        (self.worker_count * self.queue_depth_multiplier).max(1)
    }
}

/// One unit of work: an input plus the private channel its result is
/// delivered on. Consumed exactly once by one worker.
struct Job<In, Out> {
    input: In,
    reply: oneshot::Sender<JobResult<Out>>,
}

/// Handle to a submitted job's pending result.
pub struct JobHandle<Out> {
    rx: oneshot::Receiver<JobResult<Out>>,
    token: CancellationToken,
}

impl<Out> JobHandle<Out> {
    /// Wait for the job's result.
    ///
    /// A job whose reply channel was dropped during shutdown resolves to
    /// `PoolError::Cancelled`; a dropped channel with the pool still live
    /// means the worker terminated abnormally.
    pub async fn wait(self) -> JobResult<Out> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) if self.token.is_cancelled() => Err(PoolError::Cancelled),
            Err(_) => Err(PoolError::ResultDropped),
        }
    }
}

/// A fixed-size pool of concurrently scheduled workers.
///
/// Generic over the job input and output; the caller supplies the worker
/// function via [`JobHandler`]. With pool size N, at most N jobs execute
/// their handler simultaneously regardless of batch size.
pub struct WorkerPool<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    config: PoolConfig,
    handler: Arc<dyn JobHandler<In, Out>>,
    token: CancellationToken,
    tx: mpsc::Sender<Job<In, Out>>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job<In, Out>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl<In, Out> WorkerPool<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Create a pool. No workers run until [`start`](Self::start) is called;
    /// submissions made before then queue up to the configured depth.
    pub fn new(config: PoolConfig, handler: Arc<dyn JobHandler<In, Out>>) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_depth());
        Self {
            config,
            handler,
            token: CancellationToken::new(),
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Cancellation token shared with the workers. Callers may derive child
    /// tokens from it for per-job deadlines.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawn the workers. Idempotent: calling twice is a no-op.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut handles = Vec::with_capacity(self.config.worker_count);
        for worker in 0..self.config.worker_count {
            let handler = Arc::clone(&self.handler);
            let rx = Arc::clone(&self.rx);
            let token = self.token.clone();
            handles.push(tokio::spawn(worker_loop(worker, handler, rx, token)));
        }

        match self.workers.lock() {
            Ok(mut guard) => guard.extend(handles),
            Err(poisoned) => poisoned.into_inner().extend(handles),
        }

        tracing::info!(
            workers = self.config.worker_count,
            queue_depth = self.config.queue_depth(),
            "worker pool started"
        );
    }

    /// Enqueue one job and return a handle to its pending result.
    ///
    /// Resolves the handle with a cancellation result immediately when the
    /// pool is already shut down; suspends while the queue is full. A
    /// shutdown racing with the enqueue resolves to a cancellation result
    /// rather than a propagated fault.
    pub async fn submit(&self, input: In) -> JobHandle<Out> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let handle = JobHandle {
            rx: reply_rx,
            token: self.token.clone(),
        };

        if self.token.is_cancelled() {
            let _ = reply_tx.send(Err(PoolError::Cancelled));
            return handle;
        }

        let job = Job {
            input,
            reply: reply_tx,
        };
        tokio::select! {
            // Dropping the send future here drops the job and its reply
            // sender; the handle then resolves to Cancelled via the token.
            _ = self.token.cancelled() => {}
            sent = self.tx.send(job) => {
                if let Err(mpsc::error::SendError(job)) = sent {
                    // Queue closed concurrently with submission.
                    let _ = job.reply.send(Err(PoolError::Cancelled));
                }
            }
        }

        handle
    }

    /// Submit every input, then wait for every result.
    ///
    /// Results come back in input order regardless of completion order.
    /// Starts the pool if it is not already running.
    pub async fn process_batch(&self, inputs: Vec<In>) -> Vec<JobResult<Out>> {
        self.start();

        let mut handles = Vec::with_capacity(inputs.len());
        for input in inputs {
            handles.push(self.submit(input).await);
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.wait().await);
        }
        results
    }

    /// Submit every input and invoke `callback(index, result)` as each
    /// result arrives, in completion order. Returns once every callback has
    /// fired. Starts the pool if it is not already running.
    pub async fn process_batch_with_callback<F>(&self, inputs: Vec<In>, mut callback: F)
    where
        F: FnMut(usize, JobResult<Out>) + Send,
    {
        use futures_util::stream::{FuturesUnordered, StreamExt};

        self.start();

        let mut handles = Vec::with_capacity(inputs.len());
        for input in inputs {
            handles.push(self.submit(input).await);
        }

        let mut pending: FuturesUnordered<_> = handles
            .into_iter()
            .enumerate()
            .map(|(index, handle)| async move { (index, handle.wait().await) })
            .collect();

        while let Some((index, result)) = pending.next().await {
            callback(index, result);
        }
    }

    /// Shut the pool down: stop accepting jobs, cancel queued work, and
    /// wait for all workers to exit. Idempotent and safe to call
    /// concurrently with in-flight submissions, or before `start`.
    pub async fn stop(&self) {
        self.token.cancel();

        let handles: Vec<JoinHandle<()>> = match self.workers.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        let worker_count = handles.len();
        for handle in handles {
            let _ = handle.await;
        }

        // Resolve jobs still sitting in the queue; their reply channels
        // would otherwise keep waiting callers suspended forever.
        let mut queue = self.rx.lock().await;
        queue.close();
        while let Ok(job) = queue.try_recv() {
            let _ = job.reply.send(Err(PoolError::Cancelled));
        }
        drop(queue);

        if worker_count > 0 {
            tracing::info!(workers = worker_count, "worker pool stopped");
        }
    }
}

/// One worker: pull from the shared queue until cancelled or the queue
/// closes, run the handler outside the queue lock, deliver the result.
async fn worker_loop<In, Out>(
    worker: usize,
    handler: Arc<dyn JobHandler<In, Out>>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job<In, Out>>>>,
    token: CancellationToken,
) where
    In: Send + 'static,
    Out: Send + 'static,
{
    loop {
        let job = {
            let mut queue = rx.lock().await;
            tokio::select! {
                biased;
                _ = token.cancelled() => None,
                job = queue.recv() => job,
            }
        };

        let Some(job) = job else {
            break;
        };

        let result = handler.handle(job.input).await;
        if let Err(ref e) = result {
            tracing::debug!(worker, error = %e, "job completed with error");
        }
        if job.reply.send(result).is_err() {
            tracing::trace!(worker, "caller dropped job handle before result");
        }
    }

    tracing::debug!(worker, "worker exited");
}
