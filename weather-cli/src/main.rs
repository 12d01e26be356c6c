//! Binary crate for the `weather-fetcher` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Running the refresh loop on the main (interactive) thread
//! - Human-friendly output formatting

use clap::Parser;

mod app;
mod cli;
mod display;
mod logger;

fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    logger::init(cmd.debug)?;
    cmd.run()
}
