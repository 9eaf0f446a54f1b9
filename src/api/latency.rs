//! Upstream fetch latency, one sample per successful market call.
//! The market client records, `/stats/latency` reads.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;
use serde::Serialize;

/// Percentiles in microseconds. All `None` until the first sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    pub samples: u64,
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
    pub max_us: Option<u64>,
}

pub struct LatencyStats {
    inner: Mutex<Histogram<u64>>,
}

impl LatencyStats {
    /// 1us to 100s at 3 significant figures.
    pub fn new() -> Self {
        let histogram =
            Histogram::new_with_bounds(1, 100_000_000, 3).expect("valid histogram bounds");
        Self { inner: Mutex::new(histogram) }
    }

    pub fn record(&self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX).max(1);
        if let Ok(mut h) = self.inner.lock() {
            // Out-of-range samples saturate instead of being dropped.
            h.saturating_record(us);
        }
    }

    pub fn summary(&self) -> LatencySummary {
        let Ok(h) = self.inner.lock() else {
            return LatencySummary::default();
        };
        if h.is_empty() {
            return LatencySummary::default();
        }
        LatencySummary {
            samples: h.len(),
            p50_us: Some(h.value_at_quantile(0.5)),
            p95_us: Some(h.value_at_quantile(0.95)),
            p99_us: Some(h.value_at_quantile(0.99)),
            max_us: Some(h.max()),
        }
    }

    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_has_no_percentiles() {
        let stats = LatencyStats::new();
        assert!(stats.is_empty());
        assert_eq!(stats.summary(), LatencySummary::default());
    }

    #[test]
    fn percentiles_follow_samples() {
        let stats = LatencyStats::new();
        for ms in 1..=100u64 {
            stats.record(Duration::from_millis(ms));
        }
        let s = stats.summary();
        let p50 = s.p50_us.unwrap();
        assert!((49_000..=51_000).contains(&p50), "p50={p50}");
        assert!(s.p95_us.unwrap() >= p50);
        assert!(s.p99_us.unwrap() >= s.p95_us.unwrap());
        assert!(s.max_us.unwrap() >= 99_000);
        assert_eq!(s.samples, 100);
    }

    #[test]
    fn oversized_sample_is_kept() {
        let stats = LatencyStats::new();
        stats.record(Duration::from_secs(500));
        assert_eq!(stats.len(), 1);
    }
}
