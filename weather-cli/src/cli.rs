use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{CustomUserError, Password, PasswordDisplayMode, Text, validator::Validation};
use std::time::Duration;
use weather_fetcher_core::{Config, LocationKey};

use crate::app::{App, resolve_location};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-fetcher", version, about = "Periodically fetch current weather")]
pub struct Cli {
    /// Verbose logging to stderr.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and a default location.
    Configure,

    /// Fetch current weather once.
    Show {
        /// City name or "lat,lon"; defaults to the configured location.
        location: Option<String>,
    },

    /// Keep refreshing current weather until interrupted.
    Watch {
        /// City name or "lat,lon"; defaults to the configured location.
        location: Option<String>,

        /// Seconds between refreshes; overrides the configured interval.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { location } => {
                let config = Config::load()?;
                let location = resolve_location(location, &config)?;
                App::from_config(&config)?.show(&location)
            }
            Command::Watch { location, interval } => {
                let config = Config::load()?;
                let location = resolve_location(location, &config)?;
                let interval = interval
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| config.refresh.interval());
                App::from_config(&config)?.watch(&location, interval)
            }
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message("Leave empty to keep the current key")
        .prompt()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        config.set_api_key(api_key.trim().to_string());
    }

    let current = config.default_location.clone().unwrap_or_default();
    let location = Text::new("Default location:")
        .with_default(&current)
        .with_validator(|input: &str| -> Result<Validation, CustomUserError> {
            if input.trim().is_empty() {
                return Ok(Validation::Valid);
            }
            Ok(match LocationKey::new(input) {
                Ok(_) => Validation::Valid,
                Err(e) => Validation::Invalid(e.to_string().into()),
            })
        })
        .prompt()
        .context("Failed to read default location")?;
    config.default_location = Some(location.trim().to_string()).filter(|l| !l.is_empty());

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());

    if config.api_key().is_err() {
        println!("Note: no API key stored yet; `show` and `watch` need one.");
    }
    Ok(())
}
