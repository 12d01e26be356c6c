use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{
    Config,
    clock::Clock,
    fetcher::openweather::OpenWeatherFetcher,
    model::{FetchOutcome, LocationKey},
};

pub mod openweather;

/// One request to the weather provider per call.
///
/// Implementations may block for as long as their request timeout allows;
/// callers must only invoke this from the runner's worker pool.
#[async_trait]
pub trait Fetcher: Send + Sync + Debug {
    async fn fetch(&self, location: &LocationKey) -> FetchOutcome;
}

/// Build the OpenWeather fetcher from the loaded configuration.
pub fn fetcher_from_config(
    config: &Config,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Arc<dyn Fetcher>> {
    let api_key = config.api_key()?;
    let fetcher = OpenWeatherFetcher::new(
        config.base_url(),
        api_key,
        config.refresh.request_timeout(),
        clock,
    )?;
    Ok(Arc::new(fetcher))
}
