//! Hashrate measurement and periodic reporting.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::shutdown::ShutdownSignal;
use crate::slots::StatsArray;

/// Hashes per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct HashRate(pub f64);

impl HashRate {
    /// Rate from a hash count over an elapsed duration.
    pub fn from_hashes(hashes: u64, elapsed: Duration) -> Self {
        let seconds = elapsed.as_secs_f64();
        if seconds <= 0.0 {
            return HashRate(0.0);
        }
        HashRate(hashes as f64 / seconds)
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }

    /// Format as human-readable string with appropriate units
    pub fn to_human_readable(&self) -> String {
        let rate = self.0;
        if rate >= 1_000_000_000_000.0 {
            format!("{:.2} TH/s", rate / 1_000_000_000_000.0)
        } else if rate >= 1_000_000_000.0 {
            format!("{:.2} GH/s", rate / 1_000_000_000.0)
        } else if rate >= 1_000_000.0 {
            format!("{:.2} MH/s", rate / 1_000_000.0)
        } else if rate >= 1_000.0 {
            format!("{:.2} KH/s", rate / 1_000.0)
        } else {
            format!("{:.2} H/s", rate)
        }
    }
}

impl fmt::Display for HashRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}

/// Computes rates from successive snapshots of the stats counters.
#[derive(Debug)]
pub struct HashrateMeter {
    stats: Arc<StatsArray>,
    previous: u64,
    sampled_at: Instant,
}

impl HashrateMeter {
    pub fn new(stats: Arc<StatsArray>) -> Self {
        let previous = stats.total();
        HashrateMeter {
            stats,
            previous,
            sampled_at: Instant::now(),
        }
    }

    /// Rate since the previous sample, measured at `now`.
    pub fn sample_at(&mut self, now: Instant) -> HashRate {
        let total = self.stats.total();
        let delta = total.saturating_sub(self.previous);
        let elapsed = now.saturating_duration_since(self.sampled_at);

        self.previous = total;
        self.sampled_at = now;
        HashRate::from_hashes(delta, elapsed)
    }

    pub fn sample(&mut self) -> HashRate {
        self.sample_at(Instant::now())
    }
}

/// Logs the aggregate hashrate every interval.
pub struct HashrateReporter {
    meter: HashrateMeter,
    interval: Duration,
    shutdown: ShutdownSignal,
}

impl HashrateReporter {
    pub fn new(stats: Arc<StatsArray>, interval: Duration, shutdown: ShutdownSignal) -> Self {
        HashrateReporter {
            meter: HashrateMeter::new(stats),
            interval,
            shutdown,
        }
    }

    pub fn run(mut self) {
        while !self.shutdown.sleep(self.interval) {
            let rate = self.meter.sample();
            info!(
                hashrate = %rate,
                total_hashes = self.meter.stats.total(),
                workers = self.meter.stats.len(),
                "hashrate"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_breakpoints() {
        assert_eq!(HashRate(0.0).to_human_readable(), "0.00 H/s");
        assert_eq!(HashRate(999.0).to_human_readable(), "999.00 H/s");
        assert_eq!(HashRate(1_000.0).to_human_readable(), "1.00 KH/s");
        assert_eq!(HashRate(2_500_000.0).to_human_readable(), "2.50 MH/s");
        assert_eq!(HashRate(1_500_000_000.0).to_human_readable(), "1.50 GH/s");
        assert_eq!(
            HashRate(100_000_000_000_000.0).to_string(),
            "100.00 TH/s"
        );
    }

    #[test]
    fn test_from_hashes() {
        let rate = HashRate::from_hashes(5_000, Duration::from_secs(2));
        assert_eq!(rate, HashRate(2_500.0));
        assert_eq!(HashRate::from_hashes(5_000, Duration::ZERO), HashRate(0.0));
    }

    #[test]
    fn test_meter_uses_deltas() {
        let stats = Arc::new(StatsArray::new(2));
        stats.add(0, 1_000);
        let mut meter = HashrateMeter::new(Arc::clone(&stats));
        let start = meter.sampled_at;

        stats.add(0, 3_000);
        stats.add(1, 1_000);
        let rate = meter.sample_at(start + Duration::from_secs(2));
        assert_eq!(rate, HashRate(2_000.0));

        stats.add(1, 500);
        let rate = meter.sample_at(start + Duration::from_secs(3));
        assert_eq!(rate, HashRate(500.0));
    }
}
