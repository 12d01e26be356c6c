//! Drives refreshes and applies their results on the interactive thread.
//!
//! Every location is either idle or has exactly one job in flight. A tick on
//! an idle location is answered from the cache when possible and otherwise
//! submits a job to the [`Runner`]. Completions are drained from the runner's
//! channel by [`Coordinator::process_pending`] or
//! [`Coordinator::wait_and_process`], which must be called from the same
//! thread that owns the sink. The cache is only ever touched from that
//! thread, so it needs no lock.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        mpsc::{Receiver, RecvTimeoutError, TryRecvError},
    },
    time::Duration,
};

use crate::{
    cache::ResultCache,
    clock::Clock,
    error::FetchError,
    model::{FetchJob, JobId, LocationKey, WeatherReading},
    runner::{Completion, Runner},
};

/// UI-state consumer. Only ever called from the interactive thread.
pub trait WeatherSink {
    fn publish_reading(&mut self, reading: &WeatherReading);

    fn publish_error(&mut self, location: &LocationKey, error: &FetchError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    InFlight(JobId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A fresh cached reading was published.
    CacheHit,
    Submitted(JobId),
    /// Nothing done; the location already has a job running.
    AlreadyInFlight(JobId),
}

pub struct Coordinator<S> {
    runner: Runner,
    completions: Receiver<Completion>,
    cache: ResultCache,
    in_flight: HashMap<LocationKey, JobId>,
    next_job: u64,
    clock: Arc<dyn Clock>,
    sink: S,
}

impl<S: WeatherSink> Coordinator<S> {
    pub fn new(
        runner: Runner,
        completions: Receiver<Completion>,
        cache: ResultCache,
        clock: Arc<dyn Clock>,
        sink: S,
    ) -> Self {
        Self {
            runner,
            completions,
            cache,
            in_flight: HashMap::new(),
            next_job: 1,
            clock,
            sink,
        }
    }

    /// Timer tick or manual refresh for `location`.
    pub fn tick(&mut self, location: &LocationKey) -> TickOutcome {
        if let Some(&id) = self.in_flight.get(location) {
            tracing::debug!(
                location = %location,
                job = %id,
                "fetch already in flight, skipping tick"
            );
            return TickOutcome::AlreadyInFlight(id);
        }

        if let Some(reading) = self.cache.lookup(location, self.clock.now()) {
            tracing::debug!(location = %location, "cache hit");
            self.sink.publish_reading(&reading);
            return TickOutcome::CacheHit;
        }

        let id = JobId(self.next_job);
        self.next_job += 1;
        self.in_flight.insert(location.clone(), id);

        tracing::info!(location = %location, job = %id, "cache miss, fetching");
        self.runner.submit(FetchJob { id, location: location.clone() });
        TickOutcome::Submitted(id)
    }

    /// Applies every completion already waiting in the channel.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.completions.try_recv() {
                Ok(completion) => {
                    self.apply(completion);
                    applied += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return applied,
            }
        }
    }

    /// Blocks up to `timeout` for the next completion, then drains the rest.
    pub fn wait_and_process(&mut self, timeout: Duration) -> usize {
        match self.completions.recv_timeout(timeout) {
            Ok(completion) => {
                self.apply(completion);
                1 + self.process_pending()
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn apply(&mut self, completion: Completion) {
        let Completion { job, outcome, elapsed } = completion;

        if self.in_flight.get(&job.location) != Some(&job.id) {
            tracing::warn!(
                location = %job.location,
                job = %job.id,
                "discarding completion for a job that is not in flight"
            );
            return;
        }
        self.in_flight.remove(&job.location);

        match outcome {
            Ok(reading) => {
                if self.cache.store(job.location.clone(), reading.clone()) {
                    tracing::info!(
                        location = %job.location,
                        job = %job.id,
                        elapsed_ms = elapsed.as_millis(),
                        "publishing fresh reading"
                    );
                    self.sink.publish_reading(&reading);
                } else {
                    tracing::debug!(
                        location = %job.location,
                        job = %job.id,
                        "stale reading dropped"
                    );
                }
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::warn!(
                        location = %job.location,
                        kind = err.kind(),
                        "{err}; will retry on next tick"
                    );
                } else {
                    tracing::error!(location = %job.location, kind = err.kind(), "{err}");
                }
                self.sink.publish_error(&job.location, &err);
            }
        }
    }

    pub fn state(&self, location: &LocationKey) -> FetchState {
        match self.in_flight.get(location) {
            Some(&id) => FetchState::InFlight(id),
            None => FetchState::Idle,
        }
    }

    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
