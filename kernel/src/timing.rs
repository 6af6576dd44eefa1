// Operation Timing
//
// Log how long pipeline steps take.

use std::collections::HashMap;
use std::fmt::Display;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

/// Run `f`, logging start, completion and duration.
///
/// Failures are logged with the elapsed time and returned unchanged.
pub fn time_operation<T, E, F>(name: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: Display,
{
    info!("starting operation: {name}");
    let started = Instant::now();
    let result = f();
    let elapsed = started.elapsed().as_secs_f64();

    match &result {
        Ok(_) => info!("completed operation '{name}' in {elapsed:.2} seconds"),
        Err(e) => error!("operation '{name}' failed after {elapsed:.2} seconds: {e}"),
    }
    result
}

/// Tracks durations of named operations across a run.
#[derive(Debug, Default)]
pub struct OperationTimer {
    started: HashMap<String, Instant>,
    completed: Vec<(String, Duration)>,
}

impl OperationTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, operation: &str) {
        debug!("started timing: {operation}");
        self.started.insert(operation.to_string(), Instant::now());
    }

    /// Stop an operation and return its duration.
    ///
    /// Stopping an operation that was never started yields zero.
    pub fn stop(&mut self, operation: &str) -> Duration {
        let Some(started) = self.started.remove(operation) else {
            warn!("stop called for unstarted operation: {operation}");
            return Duration::ZERO;
        };

        let elapsed = started.elapsed();
        info!(
            "operation '{operation}' completed in {:.2} seconds",
            elapsed.as_secs_f64()
        );
        self.completed.retain(|(name, _)| name != operation);
        self.completed.push((operation.to_string(), elapsed));
        elapsed
    }

    pub fn duration(&self, operation: &str) -> Option<Duration> {
        self.completed
            .iter()
            .find(|(name, _)| name == operation)
            .map(|(_, d)| *d)
    }

    pub fn total(&self) -> Duration {
        self.completed.iter().map(|(_, d)| *d).sum()
    }

    pub fn log_summary(&self) {
        if self.completed.is_empty() {
            info!("no operations timed");
            return;
        }

        info!("operation timing summary:");
        for (name, duration) in &self.completed {
            info!("  {name}: {:.2}s", duration.as_secs_f64());
        }
        info!("  total: {:.2}s", self.total().as_secs_f64());
    }
}
