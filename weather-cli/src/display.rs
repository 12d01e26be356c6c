use std::io::Write;

use chrono::Local;
use weather_fetcher_core::{FetchError, LocationKey, WeatherReading, WeatherSink};

/// Renders published readings and errors as plain text.
#[derive(Debug)]
pub struct TerminalSink<W> {
    out: W,
    last_error: Option<FetchError>,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, last_error: None }
    }

    /// Transient status line, e.g. while a fetch is running.
    pub fn status(&mut self, message: &str) {
        self.write_block(&format!("{message}\n"));
    }

    /// Error from the most recent publication, cleared by a reading.
    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    #[cfg(test)]
    pub fn written(&self) -> &W {
        &self.out
    }

    fn write_block(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush()) {
            tracing::warn!("Failed to write to terminal: {e}");
        }
    }
}

impl<W: Write> WeatherSink for TerminalSink<W> {
    fn publish_reading(&mut self, reading: &WeatherReading) {
        self.last_error = None;
        let text = format_reading(reading);
        self.write_block(&text);
    }

    fn publish_error(&mut self, location: &LocationKey, error: &FetchError) {
        self.last_error = Some(error.clone());
        self.write_block(&format!("Error ({location}): {}\n", user_message(error)));
    }
}

fn format_reading(reading: &WeatherReading) -> String {
    let updated = reading.fetched_at.with_timezone(&Local).format("%H:%M:%S");
    format!(
        "Weather in {}: {}\nTemperature: {:.1}°C\nHumidity: {}%\nWind: {:.1} m/s\n\
         Updated: {updated}\n\n",
        reading.place_name,
        reading.condition,
        reading.temperature_c,
        reading.humidity_pct,
        reading.wind_speed_mps,
    )
}

fn user_message(error: &FetchError) -> String {
    match error {
        FetchError::NotFound => "Unknown location. Check the spelling and try again.".to_string(),
        FetchError::RateLimited => {
            "The weather service is busy. Will try again on the next refresh.".to_string()
        }
        other => other.to_string(),
    }
}
