//! Recording delay

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use embedded_hal::delay::DelayNs;

/// Delay that records requested sleeps instead of sleeping
///
/// Clones share counters, so a test can keep one while the driver owns
/// the other.
#[derive(Debug, Clone, Default)]
pub struct SimDelay {
    calls: Arc<AtomicU32>,
    total_ns: Arc<AtomicU64>,
}

impl SimDelay {
    /// Create a new delay with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of delay requests
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Total requested delay in whole milliseconds
    pub fn total_ms(&self) -> u64 {
        self.total_ns.load(Ordering::SeqCst) / 1_000_000
    }

    fn record(&self, ns: u64) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.total_ns.fetch_add(ns, Ordering::SeqCst);
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.record(ns as u64);
    }

    fn delay_us(&mut self, us: u32) {
        self.record(us as u64 * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.record(ms as u64 * 1_000_000);
    }
}
