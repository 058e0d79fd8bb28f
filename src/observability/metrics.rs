//! Thread-safe metrics collection
//!
//! Atomic counters for runs and progress events, mutex-protected collections
//! for per-step timings. Exposed as a JSON snapshot on `/metrics`.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

const MAX_SAMPLES: usize = 1000;

/// Thread-safe metrics collector using atomics and mutexes
pub struct MetricsCollector {
    runs_started: AtomicU64,
    runs_in_flight: AtomicU64,
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    runs_rejected: AtomicU64,
    runs_cancelled: AtomicU64,

    thoughts_emitted: AtomicU64,
    tool_calls_emitted: AtomicU64,
    finished_emitted: AtomicU64,

    run_durations: Mutex<Vec<u64>>, // in milliseconds
    step_stats: Mutex<HashMap<String, StepStats>>,

    started_at: AtomicU64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_in_flight: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            runs_rejected: AtomicU64::new(0),
            runs_cancelled: AtomicU64::new(0),
            thoughts_emitted: AtomicU64::new(0),
            tool_calls_emitted: AtomicU64::new(0),
            finished_emitted: AtomicU64::new(0),
            run_durations: Mutex::new(Vec::new()),
            step_stats: Mutex::new(HashMap::new()),
            started_at: AtomicU64::new(current_timestamp()),
        }
    }

    // Run lifecycle
    pub fn run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        self.runs_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn run_completed(&self, duration: Duration) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.finish_run(duration);
    }

    pub fn run_failed(&self, duration: Duration) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        self.finish_run(duration);
    }

    pub fn run_cancelled(&self, duration: Duration) {
        self.runs_cancelled.fetch_add(1, Ordering::Relaxed);
        self.finish_run(duration);
    }

    /// Input rejected before any pipeline was started
    pub fn run_rejected(&self) {
        self.runs_rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn finish_run(&self, duration: Duration) {
        // Saturate so a stray finish can never wrap the gauge
        let _ = self
            .runs_in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
        if let Ok(mut times) = self.run_durations.lock() {
            push_bounded(&mut times, duration.as_millis() as u64);
        }
    }

    /// Count a progress event by its `kind()` label
    pub fn record_event(&self, kind: &str) {
        let counter = match kind {
            "thought" => &self.thoughts_emitted,
            "tool_call" => &self.tool_calls_emitted,
            _ => &self.finished_emitted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_step(&self, step_name: &str, duration: Duration, success: bool) {
        if let Ok(mut stats) = self.step_stats.lock() {
            let entry = stats
                .entry(step_name.to_string())
                .or_insert_with(|| StepStats {
                    name: step_name.to_string(),
                    ..Default::default()
                });
            entry.executions += 1;
            if !success {
                entry.failures += 1;
            }
            entry.last_execution = current_timestamp();
            push_bounded(&mut entry.execution_times, duration.as_millis() as u64);
        }
    }

    // Reset all metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.runs_started,
            &self.runs_in_flight,
            &self.runs_completed,
            &self.runs_failed,
            &self.runs_rejected,
            &self.runs_cancelled,
            &self.thoughts_emitted,
            &self.tool_calls_emitted,
            &self.finished_emitted,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut times) = self.run_durations.lock() {
            times.clear();
        }
        if let Ok(mut stats) = self.step_stats.lock() {
            stats.clear();
        }
        self.started_at
            .store(current_timestamp(), Ordering::Relaxed);
    }

    fn run_duration_statistics(&self) -> (f64, f64, f64) {
        let Ok(times) = self.run_durations.lock() else {
            return (0.0, 0.0, 0.0);
        };
        if times.is_empty() {
            return (0.0, 0.0, 0.0);
        }
        let mut sorted = times.clone();
        sorted.sort_unstable();
        let avg = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
        (avg, percentile(&sorted, 50.0), percentile(&sorted, 95.0))
    }

    fn step_snapshots(&self) -> HashMap<String, StepStatsSnapshot> {
        let Ok(stats) = self.step_stats.lock() else {
            return HashMap::new();
        };
        stats
            .iter()
            .map(|(name, stats)| (name.clone(), stats.snapshot()))
            .collect()
    }

    /// Point-in-time copy of every metric
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let (avg, p50, p95) = self.run_duration_statistics();

        MetricsSnapshot {
            timestamp: now,
            uptime_seconds: now.saturating_sub(self.started_at.load(Ordering::Relaxed)),
            runs: RunMetrics {
                started: self.runs_started.load(Ordering::Relaxed),
                in_flight: self.runs_in_flight.load(Ordering::Relaxed),
                completed: self.runs_completed.load(Ordering::Relaxed),
                failed: self.runs_failed.load(Ordering::Relaxed),
                rejected: self.runs_rejected.load(Ordering::Relaxed),
                cancelled: self.runs_cancelled.load(Ordering::Relaxed),
                avg_duration_ms: avg,
                p50_duration_ms: p50,
                p95_duration_ms: p95,
            },
            events: EventMetrics {
                thoughts: self.thoughts_emitted.load(Ordering::Relaxed),
                tool_calls: self.tool_calls_emitted.load(Ordering::Relaxed),
                finished: self.finished_emitted.load(Ordering::Relaxed),
            },
            steps: self.step_snapshots(),
        }
    }
}

#[derive(Debug, Default)]
struct StepStats {
    name: String,
    executions: u64,
    failures: u64,
    execution_times: Vec<u64>,
    last_execution: u64,
}

impl StepStats {
    fn snapshot(&self) -> StepStatsSnapshot {
        let avg_execution_time_ms = if self.execution_times.is_empty() {
            0.0
        } else {
            self.execution_times.iter().sum::<u64>() as f64 / self.execution_times.len() as f64
        };
        let success_rate = if self.executions == 0 {
            0.0
        } else {
            (self.executions - self.failures) as f64 / self.executions as f64
        };

        StepStatsSnapshot {
            name: self.name.clone(),
            executions: self.executions,
            failures: self.failures,
            avg_execution_time_ms,
            last_execution: self.last_execution,
            success_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: u64,
    pub uptime_seconds: u64,
    pub runs: RunMetrics,
    pub events: EventMetrics,
    pub steps: HashMap<String, StepStatsSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    pub started: u64,
    pub in_flight: u64,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
    pub cancelled: u64,
    pub avg_duration_ms: f64,
    pub p50_duration_ms: f64,
    pub p95_duration_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventMetrics {
    pub thoughts: u64,
    pub tool_calls: u64,
    pub finished: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepStatsSnapshot {
    pub name: String,
    pub executions: u64,
    pub failures: u64,
    pub avg_execution_time_ms: f64,
    pub last_execution: u64,
    pub success_rate: f64,
}

fn push_bounded(samples: &mut Vec<u64>, value: u64) {
    samples.push(value);
    if samples.len() > MAX_SAMPLES {
        samples.remove(0);
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = sorted_data[index.floor() as usize] as f64;
    let upper = sorted_data[index.ceil() as usize] as f64;
    lower + (upper - lower) * index.fract()
}
