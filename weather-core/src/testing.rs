//! Fetcher doubles shared by the runner and coordinator tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::Semaphore;

use crate::{
    error::FetchError,
    fetcher::Fetcher,
    model::{FetchOutcome, LocationKey, WeatherReading},
};

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("valid timestamp")
}

pub fn sample_reading(location: &str, fetched_secs: i64) -> WeatherReading {
    WeatherReading {
        location: LocationKey::new(location).expect("valid location"),
        place_name: location.to_string(),
        temperature_c: 20.0,
        humidity_pct: 50,
        condition: "Clear".to_string(),
        wind_speed_mps: 5.0,
        observed_at: None,
        fetched_at: at(fetched_secs),
    }
}

/// Hands out the given outcomes in order.
#[derive(Debug)]
pub struct ScriptedFetcher {
    outcomes: Mutex<VecDeque<FetchOutcome>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(outcomes: Vec<FetchOutcome>) -> Self {
        Self { outcomes: Mutex::new(outcomes.into()), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, _location: &LocationKey) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Network("script exhausted".into())))
    }
}

/// Blocks every fetch until the test releases it.
#[derive(Debug)]
pub struct GatedFetcher {
    gate: Semaphore,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl GatedFetcher {
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_seen(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl Default for GatedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for GatedFetcher {
    async fn fetch(&self, location: &LocationKey) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(sample_reading(location.as_str(), 0))
    }
}

#[derive(Debug)]
pub struct SlowFetcher {
    delay: Duration,
}

impl SlowFetcher {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Fetcher for SlowFetcher {
    async fn fetch(&self, location: &LocationKey) -> FetchOutcome {
        tokio::time::sleep(self.delay).await;
        Ok(sample_reading(location.as_str(), 0))
    }
}

#[derive(Debug)]
pub struct PanickingFetcher;

#[async_trait]
impl Fetcher for PanickingFetcher {
    async fn fetch(&self, _location: &LocationKey) -> FetchOutcome {
        panic!("provider client blew up");
    }
}
