//! Throughput accounting for periodic rate logging
//!
//! Not part of correctness. The window counter is advanced with a single
//! compare-and-swap loop so exactly one caller observes each threshold
//! crossing, no matter how many producers race.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Default events per reporting window
pub const DEFAULT_THRESHOLD: u64 = 1000;

/// One completed window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputReport {
    pub events: u64,
    pub elapsed: Duration,
}

impl ThroughputReport {
    pub fn events_per_ms(&self) -> f64 {
        let ms = self.elapsed.as_secs_f64() * 1000.0;
        if ms > 0.0 {
            self.events as f64 / ms
        } else {
            self.events as f64
        }
    }
}

/// Counts enqueues and reports once per `threshold` events
#[derive(Debug)]
pub struct ThroughputCounter {
    threshold: u64,
    window: AtomicU64,
    total: AtomicU64,
    /// Microseconds since `origin` at which the current window opened
    window_start_us: AtomicU64,
    origin: Instant,
}

impl ThroughputCounter {
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold: threshold.max(1),
            window: AtomicU64::new(0),
            total: AtomicU64::new(0),
            window_start_us: AtomicU64::new(0),
            origin: Instant::now(),
        }
    }

    /// Count one event; returns a report for the caller that closed a window
    pub fn record(&self) -> Option<ThroughputReport> {
        self.total.fetch_add(1, Ordering::Relaxed);

        let threshold = self.threshold;
        let prev = self
            .window
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                Some(if count + 1 >= threshold { 0 } else { count + 1 })
            })
            .unwrap_or_else(|count| count);
        let count = prev + 1;

        let now_us = self.origin.elapsed().as_micros() as u64;
        if count >= threshold {
            let start_us = self.window_start_us.load(Ordering::Acquire);
            return Some(ThroughputReport {
                events: threshold,
                elapsed: Duration::from_micros(now_us.saturating_sub(start_us)),
            });
        }
        if count == 1 {
            self.window_start_us.store(now_us, Ordering::Release);
        }
        None
    }

    /// Events counted since construction
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }
}

impl Default for ThroughputCounter {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
