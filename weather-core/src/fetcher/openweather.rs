use anyhow::Context;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::{fmt, sync::Arc, time::Duration};

use crate::{
    clock::Clock,
    error::FetchError,
    model::{FetchOutcome, LocationKey, LocationQuery, WeatherReading},
};

use super::Fetcher;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

#[derive(Clone)]
pub struct OpenWeatherFetcher {
    base_url: String,
    api_key: String,
    http: Client,
    clock: Arc<dyn Clock>,
}

impl OpenWeatherFetcher {
    pub fn new(
        base_url: impl Into<String>,
        api_key: String,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for OpenWeather")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            http,
            clock,
        })
    }

    async fn fetch_current(&self, location: &LocationKey) -> FetchOutcome {
        let url = format!("{}/data/2.5/weather", self.base_url);

        let mut query: Vec<(&str, String)> = match location.query() {
            LocationQuery::City(name) => vec![("q", name.to_string())],
            LocationQuery::Coordinates { lat, lon } => {
                vec![("lat", lat.to_string()), ("lon", lon.to_string())]
            }
        };
        query.push(("appid", self.api_key.clone()));
        query.push(("units", "metric".to_string()));

        let res = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = res.status();
        let body = res.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let parsed: OwCurrentResponse = serde_json::from_str(&body)
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        let condition = parsed
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .ok_or_else(|| {
                FetchError::MalformedResponse("response contained no weather condition".into())
            })?;

        let place_name = if parsed.name.is_empty() {
            location.to_string()
        } else {
            parsed.name
        };

        Ok(WeatherReading {
            location: location.clone(),
            place_name,
            temperature_c: parsed.main.temp,
            humidity_pct: parsed.main.humidity,
            condition,
            wind_speed_mps: parsed.wind.speed,
            observed_at: parsed.dt.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            fetched_at: self.clock.now(),
        })
    }
}

impl fmt::Debug for OpenWeatherFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenWeatherFetcher")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    name: String,
    dt: Option<i64>,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

#[async_trait]
impl Fetcher for OpenWeatherFetcher {
    async fn fetch(&self, location: &LocationKey) -> FetchOutcome {
        self.fetch_current(location).await
    }
}

// The request URL carries the API key, so it never goes into the message.
fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Network(format!("request timed out: {}", e.without_url()))
    } else {
        FetchError::Network(e.without_url().to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> FetchError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
        StatusCode::NOT_FOUND => FetchError::NotFound,
        _ => FetchError::Upstream { status: status.as_u16(), message: truncate_body(body) },
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
