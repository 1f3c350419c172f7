//! Named timing spans attached to batches

use std::time::{Duration, Instant};

/// Wall-clock timing of one named operation
#[derive(Debug, Clone)]
pub struct Timing {
    name: String,
    started: Option<Instant>,
    elapsed: Duration,
}

impl Timing {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            started: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Create and start a timing
    pub fn started(name: impl Into<String>) -> Self {
        let mut timing = Self::new(name);
        timing.start();
        timing
    }

    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Stop the clock and add the time since `start` to the elapsed total
    pub fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.elapsed += started.elapsed();
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }
}

/// Timings collected while producing a batch
#[derive(Debug, Clone, Default)]
pub struct ProfilingStats {
    timings: Vec<Timing>,
}

impl ProfilingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, timing: Timing) {
        self.timings.push(timing);
    }

    /// Append the timings of another batch, e.g. one produced upstream
    pub fn merge(&mut self, other: ProfilingStats) {
        self.timings.extend(other.timings);
    }

    /// First timing with the given name
    pub fn get(&self, name: &str) -> Option<&Timing> {
        self.timings.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Timing> {
        self.timings.iter()
    }

    pub fn len(&self) -> usize {
        self.timings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timings.is_empty()
    }

    pub fn total(&self) -> Duration {
        self.timings.iter().map(Timing::elapsed).sum()
    }
}
