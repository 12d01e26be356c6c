//! Background execution of fetch jobs.
//!
//! Jobs run on a tokio runtime so the interactive thread never waits on the
//! network. Each job produces exactly one [`Completion`], sent over an mpsc
//! channel that the coordinator drains on the interactive thread.

use std::{
    sync::{Arc, mpsc},
    time::{Duration, Instant},
};

use tokio::{runtime::Handle, sync::Semaphore};
use tracing::Instrument;

use crate::{
    config::RefreshConfig,
    error::FetchError,
    fetcher::Fetcher,
    model::{FetchJob, FetchOutcome, LocationKey},
};

/// Extra time a job gets on top of the HTTP request timeout before the
/// runner gives up on it.
pub const JOB_TIMEOUT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Jobs allowed to talk to the provider at once; the rest wait in line.
    pub max_concurrent: usize,
    /// Hard deadline for a single fetch, measured once it starts running.
    pub job_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from(&RefreshConfig::default())
    }
}

impl From<&RefreshConfig> for RunnerConfig {
    fn from(cfg: &RefreshConfig) -> Self {
        Self {
            max_concurrent: cfg.max_concurrent_fetches.max(1),
            job_timeout: cfg.request_timeout() + JOB_TIMEOUT_GRACE,
        }
    }
}

/// Result of one job, delivered back to the coordinator.
#[derive(Debug)]
pub struct Completion {
    pub job: FetchJob,
    pub outcome: FetchOutcome,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct Runner {
    handle: Handle,
    fetcher: Arc<dyn Fetcher>,
    permits: Arc<Semaphore>,
    job_timeout: Duration,
    tx: mpsc::Sender<Completion>,
}

impl Runner {
    /// Creates a runner executing on `handle` and the receiving end of its
    /// completion channel.
    pub fn new(
        handle: Handle,
        fetcher: Arc<dyn Fetcher>,
        config: RunnerConfig,
    ) -> (Self, mpsc::Receiver<Completion>) {
        let (tx, rx) = mpsc::channel();
        let runner = Self {
            handle,
            fetcher,
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            job_timeout: config.job_timeout,
            tx,
        };
        (runner, rx)
    }

    /// Queues `job` for execution and returns immediately.
    ///
    /// No deduplication happens here; every submitted job runs and completes.
    pub fn submit(&self, job: FetchJob) {
        let fetcher = Arc::clone(&self.fetcher);
        let permits = Arc::clone(&self.permits);
        let tx = self.tx.clone();
        let job_timeout = self.job_timeout;
        let span = tracing::info_span!("fetch", job = %job.id, location = %job.location);

        tracing::debug!(job = %job.id, location = %job.location, "submitting fetch job");

        self.handle.spawn(
            async move {
                // Never closed, so the permit is always granted eventually.
                let _permit = permits.acquire_owned().await.ok();

                let started = Instant::now();
                let outcome = run_job(fetcher, job.location.clone(), job_timeout).await;
                let elapsed = started.elapsed();

                match &outcome {
                    Ok(_) => tracing::debug!(elapsed_ms = elapsed.as_millis(), "fetch succeeded"),
                    Err(e) => tracing::warn!(
                        elapsed_ms = elapsed.as_millis(),
                        kind = e.kind(),
                        "fetch failed: {e}"
                    ),
                }

                if tx.send(Completion { job, outcome, elapsed }).is_err() {
                    tracing::debug!("completion receiver dropped, discarding outcome");
                }
            }
            .instrument(span),
        );
    }
}

/// Runs the fetch in its own task so a panic or a hung request still turns
/// into an outcome.
async fn run_job(
    fetcher: Arc<dyn Fetcher>,
    location: LocationKey,
    job_timeout: Duration,
) -> FetchOutcome {
    let mut task = tokio::spawn(async move { fetcher.fetch(&location).await });

    match tokio::time::timeout(job_timeout, &mut task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_err)) => {
            tracing::error!("fetch task aborted: {join_err}");
            Err(FetchError::Network(format!("fetch task failed: {join_err}")))
        }
        Err(_) => {
            task.abort();
            Err(FetchError::Network(format!(
                "request timed out after {:.1}s",
                job_timeout.as_secs_f64()
            )))
        }
    }
}
