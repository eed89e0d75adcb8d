// Session metrics module
//
// Lightweight counters for what happened during one session

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Session counters
///
/// Uses atomic operations so the controller can share one instance across
/// async tasks without locking. Logged once when the session ends.
#[derive(Debug)]
pub struct Metrics {
    /// Number of times the configuration files were written
    pub configs_saved: AtomicU64,

    /// Number of entry lists generated
    pub entry_lists_generated: AtomicU64,

    /// Number of field values that could not be converted on load
    pub field_conversion_failures: AtomicU64,

    /// Number of server launches
    pub server_starts: AtomicU64,

    /// Number of server stops (tracked handle or kill by name)
    pub server_stops: AtomicU64,

    /// Session start time
    start_time: Instant,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            configs_saved: AtomicU64::new(0),
            entry_lists_generated: AtomicU64::new(0),
            field_conversion_failures: AtomicU64::new(0),
            server_starts: AtomicU64::new(0),
            server_stops: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_config_saved(&self) {
        self.configs_saved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_entry_list(&self) {
        self.entry_lists_generated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `count` field conversion failures from one load
    pub fn record_conversion_failures(&self, count: usize) {
        self.field_conversion_failures
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_server_start(&self) {
        self.server_starts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_server_stop(&self) {
        self.server_stops.fetch_add(1, Ordering::Relaxed);
    }

    /// Get session duration
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Session Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Configs saved: {}, entry lists generated: {}, field conversion failures: {}",
            self.configs_saved.load(Ordering::Relaxed),
            self.entry_lists_generated.load(Ordering::Relaxed),
            self.field_conversion_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Server starts: {}, stops: {}",
            self.server_starts.load(Ordering::Relaxed),
            self.server_stops.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
