//! Core library for the `weather-fetcher` client.
//!
//! This crate defines:
//! - The HTTP fetcher for current conditions (OpenWeather)
//! - A time-bounded cache of the latest reading per location
//! - A background runner that keeps network I/O off the interactive thread
//! - The coordinator that schedules refreshes and publishes results to a sink
//! - Configuration & credentials handling
//!
//! It is used by `weather-fetcher-cli`, but any front end that can drain a
//! channel on its own thread can drive a [`Coordinator`].

pub mod cache;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod runner;

#[cfg(test)]
mod testing;

pub use cache::{CacheEntry, DEFAULT_CACHE_TTL, ResultCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, RefreshConfig};
pub use coordinator::{Coordinator, FetchState, TickOutcome, WeatherSink};
pub use error::{FetchError, InvalidLocation};
pub use fetcher::{Fetcher, fetcher_from_config, openweather::OpenWeatherFetcher};
pub use model::{FetchJob, FetchOutcome, JobId, LocationKey, LocationQuery, WeatherReading};
pub use runner::{Completion, Runner, RunnerConfig};
