use std::{
    io::{self, BufRead, Stdout, Write},
    sync::{Arc, mpsc},
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow, bail};
use tokio::runtime::Runtime;
use weather_fetcher_core::{
    Clock, Config, Coordinator, LocationKey, ResultCache, Runner, RunnerConfig, SystemClock,
    TickOutcome, fetcher_from_config,
};

use crate::display::TerminalSink;

/// Upper bound on how long the main loop blocks before checking timers
/// and manual refresh requests again.
const EVENT_LOOP_SLICE: Duration = Duration::from_millis(100);

/// When the next timed refresh is due.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    interval: Duration,
    next_tick: Instant,
}

impl Schedule {
    /// The first refresh is due immediately.
    pub fn starting_at(now: Instant, interval: Duration) -> Self {
        Self { interval, next_tick: now }
    }

    /// Returns true and re-arms the timer when a refresh is due at `now`.
    pub fn fire(&mut self, now: Instant) -> bool {
        if now < self.next_tick {
            return false;
        }
        self.next_tick = now + self.interval;
        true
    }

    pub fn until_next(&self, now: Instant) -> Duration {
        self.next_tick.saturating_duration_since(now)
    }
}

/// Interactive side of the client: owns the coordinator and drives it from
/// the main thread while fetches run on the background runtime.
pub struct App<W: Write = Stdout> {
    coordinator: Coordinator<TerminalSink<W>>,
    job_timeout: Duration,
    // Declared last so the coordinator is dropped before the workers stop.
    _runtime: Runtime,
}

impl App<Stdout> {
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_output(config, io::stdout())
    }
}

impl<W: Write> App<W> {
    pub fn with_output(config: &Config, out: W) -> Result<Self> {
        config.refresh.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .worker_threads(config.refresh.max_concurrent_fetches.clamp(1, 4))
            .thread_name("weather-fetcher-worker")
            .build()
            .context("Failed to start background runtime")?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let fetcher = fetcher_from_config(config, clock.clone())?;
        let runner_config = RunnerConfig::from(&config.refresh);
        let (runner, completions) = Runner::new(runtime.handle().clone(), fetcher, runner_config);

        let coordinator = Coordinator::new(
            runner,
            completions,
            ResultCache::new(config.refresh.cache_ttl()),
            clock,
            TerminalSink::new(out),
        );

        Ok(Self { coordinator, job_timeout: runner_config.job_timeout, _runtime: runtime })
    }

    /// Fetch once and wait for the result.
    pub fn show(&mut self, location: &LocationKey) -> Result<()> {
        self.tick(location);
        self.wait_until_idle()?;

        match self.coordinator.sink().last_error() {
            Some(err) => {
                let context = format!("Failed to fetch weather for {location}");
                Err(anyhow!(err.clone()).context(context))
            }
            None => Ok(()),
        }
    }

    /// Refresh every `interval` and whenever Enter is pressed, until the
    /// process is interrupted.
    pub fn watch(&mut self, location: &LocationKey, interval: Duration) -> Result<()> {
        let refresh_requests = spawn_refresh_listener();
        tracing::info!(
            location = %location,
            interval_secs = interval.as_secs(),
            "watching weather"
        );
        self.coordinator.sink_mut().status("Press Enter to refresh now, Ctrl+C to quit.");

        let mut schedule = Schedule::starting_at(Instant::now(), interval);
        loop {
            let manual_refreshes = refresh_requests.try_iter().count();
            self.step(location, &mut schedule, Instant::now(), manual_refreshes);

            let slice = schedule.until_next(Instant::now()).min(EVENT_LOOP_SLICE);
            self.coordinator.wait_and_process(slice);
        }
    }

    /// One pass of the watch loop: the timed refresh if it is due, then one
    /// tick per manual refresh request.
    fn step(
        &mut self,
        location: &LocationKey,
        schedule: &mut Schedule,
        now: Instant,
        manual_refreshes: usize,
    ) -> Vec<TickOutcome> {
        let mut outcomes = Vec::new();
        if schedule.fire(now) {
            outcomes.push(self.tick(location));
        }
        for _ in 0..manual_refreshes {
            tracing::debug!("manual refresh requested");
            outcomes.push(self.tick(location));
        }
        outcomes
    }

    fn wait_until_idle(&mut self) -> Result<()> {
        // Jobs may queue behind others before their own deadline starts.
        let deadline = Instant::now() + self.job_timeout * 2;
        while self.coordinator.has_in_flight() {
            if Instant::now() >= deadline {
                bail!("Timed out waiting for the weather service");
            }
            self.coordinator.wait_and_process(EVENT_LOOP_SLICE);
        }
        Ok(())
    }

    fn tick(&mut self, location: &LocationKey) -> TickOutcome {
        let outcome = self.coordinator.tick(location);
        if let TickOutcome::Submitted(_) = outcome {
            self.coordinator.sink_mut().status(&format!("Fetching weather for {location}..."));
        }
        outcome
    }
}

/// Each line on stdin becomes a refresh request for the main loop.
fn spawn_refresh_listener() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("stdin-refresh".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                if line.is_err() || tx.send(()).is_err() {
                    break;
                }
            }
        });

    if let Err(e) = spawned {
        tracing::warn!("Manual refresh unavailable: {e}");
    }

    rx
}

/// Pick the location from the command line, falling back to the configured default.
pub fn resolve_location(arg: Option<String>, config: &Config) -> Result<LocationKey> {
    let raw = arg.or_else(|| config.default_location.clone()).ok_or_else(|| {
        anyhow!(
            "No location given.\n\
             Hint: pass a city name, or run `weather-fetcher configure` to set a default location."
        )
    })?;

    Ok(LocationKey::new(&raw)?)
}
