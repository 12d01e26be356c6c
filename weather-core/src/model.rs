use chrono::{DateTime, Utc};
use std::{fmt, str::FromStr};

use crate::error::{FetchError, InvalidLocation};

/// Normalized identifier of a queried place.
///
/// City names are trimmed, whitespace-collapsed and lowercased. A `lat,lon`
/// pair is kept as coordinates with four decimals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey(String);

/// How a [`LocationKey`] is sent to the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationQuery<'a> {
    City(&'a str),
    Coordinates { lat: f64, lon: f64 },
}

impl LocationKey {
    pub fn new(raw: &str) -> Result<Self, InvalidLocation> {
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return Err(InvalidLocation::Empty);
        }

        if let Some((lat, lon)) = parse_coordinates(&collapsed) {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                return Err(InvalidLocation::CoordinatesOutOfRange(collapsed));
            }
            return Ok(Self(format!("{lat:.4},{lon:.4}")));
        }

        Ok(Self(collapsed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn query(&self) -> LocationQuery<'_> {
        match parse_coordinates(&self.0) {
            Some((lat, lon)) => LocationQuery::Coordinates { lat, lon },
            None => LocationQuery::City(&self.0),
        }
    }
}

fn parse_coordinates(s: &str) -> Option<(f64, f64)> {
    let (lat, lon) = s.split_once(',')?;
    let lat = lat.trim().parse::<f64>().ok()?;
    let lon = lon.trim().parse::<f64>().ok()?;
    Some((lat, lon))
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LocationKey {
    type Err = InvalidLocation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Current conditions for one location, as parsed from a successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReading {
    pub location: LocationKey,
    /// Place name as reported by the provider.
    pub place_name: String,
    pub temperature_c: f64,
    pub humidity_pct: u8,
    pub condition: String,
    pub wind_speed_mps: f64,
    /// Observation time reported by the provider, if any.
    pub observed_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherReading {
    /// Instant used for ordering replacements and computing cache expiry.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub id: JobId,
    pub location: LocationKey,
}

pub type FetchOutcome = Result<WeatherReading, FetchError>;
