//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations so recording never contends with
//! the lot lock. Reporting only resets the per-interval rate window.
//!
//! All atomics use Relaxed ordering. They are statistical counters and must
//! not drive any lot decision.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Prometheus-style exponential bucket boundaries (microseconds)
/// Buckets: ≤1, ≤2, ≤4, ≤8, ≤16, ≤32, ≤64, ≤128, ≤256, ≤512, >512
const BUCKET_BOUNDS: [u64; 10] = [1, 2, 4, 8, 16, 32, 64, 128, 256, 512];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Load all bucket values without resetting
#[inline]
fn load_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.load(Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] = [1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Successful check-ins (monotonic)
    check_ins_total: AtomicU64,
    /// Successful check-outs (monotonic)
    check_outs_total: AtomicU64,
    /// Check-ins refused because every spot was taken (monotonic)
    lot_full_total: AtomicU64,
    /// Check-outs of a spot with no vehicle (monotonic)
    location_empty_total: AtomicU64,
    /// Requests rejected as malformed: bad tariff, pagination, config (monotonic)
    rejected_total: AtomicU64,
    /// Sum of all fees charged, in hundredths (monotonic)
    fees_collected_cents: AtomicU64,
    /// Lot operations since last report (reset on report)
    operations_since_report: AtomicU64,
    /// Time spent holding the lot write lock, sum in microseconds (monotonic)
    op_latency_sum_us: AtomicU64,
    /// Max time spent holding the lot write lock (monotonic)
    op_latency_max_us: AtomicU64,
    /// Lock hold time histogram (cumulative)
    op_latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Last report time (only accessed from reporter, not atomic)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            check_ins_total: AtomicU64::new(0),
            check_outs_total: AtomicU64::new(0),
            lot_full_total: AtomicU64::new(0),
            location_empty_total: AtomicU64::new(0),
            rejected_total: AtomicU64::new(0),
            fees_collected_cents: AtomicU64::new(0),
            operations_since_report: AtomicU64::new(0),
            op_latency_sum_us: AtomicU64::new(0),
            op_latency_max_us: AtomicU64::new(0),
            op_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_check_in(&self) {
        self.check_ins_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_check_out(&self, fee_cents: u64) {
        self.check_outs_total.fetch_add(1, Ordering::Relaxed);
        self.fees_collected_cents.fetch_add(fee_cents, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_lot_full(&self) {
        self.lot_full_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_location_empty(&self) {
        self.location_empty_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejected(&self) {
        self.rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how long one lot operation held the lock (lock-free)
    #[inline]
    pub fn record_operation(&self, latency_us: u64) {
        self.operations_since_report.fetch_add(1, Ordering::Relaxed);
        self.op_latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.op_latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.op_latency_max_us, latency_us);
    }

    #[inline]
    pub fn check_ins_total(&self) -> u64 {
        self.check_ins_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn check_outs_total(&self) -> u64 {
        self.check_outs_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn fees_collected_cents(&self) -> u64 {
        self.fees_collected_cents.load(Ordering::Relaxed)
    }

    /// Snapshot all counters and restart the rate window
    ///
    /// Occupancy is passed in because it lives behind the lot lock.
    pub fn report(&self, occupied_spots: usize, total_spots: u32) -> MetricsSummary {
        let operations = self.operations_since_report.swap(0, Ordering::Relaxed);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        self.summarize(operations, elapsed, occupied_spots, total_spots)
    }

    /// Snapshot all counters without touching the rate window (used by scrapes)
    pub fn snapshot(&self, occupied_spots: usize, total_spots: u32) -> MetricsSummary {
        let operations = self.operations_since_report.load(Ordering::Relaxed);
        let elapsed = self.last_report_time.lock().elapsed();
        self.summarize(operations, elapsed, occupied_spots, total_spots)
    }

    fn summarize(
        &self,
        operations: u64,
        elapsed: Duration,
        occupied_spots: usize,
        total_spots: u32,
    ) -> MetricsSummary {
        let operations_per_sec = if elapsed.as_secs_f64() > 0.0 {
            operations as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let op_lat_buckets = load_buckets(&self.op_latency_buckets);
        let op_count: u64 = op_lat_buckets.iter().sum();
        let op_lat_sum_us = self.op_latency_sum_us.load(Ordering::Relaxed);
        let avg_op_latency_us = if op_count > 0 { op_lat_sum_us / op_count } else { 0 };

        MetricsSummary {
            check_ins_total: self.check_ins_total.load(Ordering::Relaxed),
            check_outs_total: self.check_outs_total.load(Ordering::Relaxed),
            lot_full_total: self.lot_full_total.load(Ordering::Relaxed),
            location_empty_total: self.location_empty_total.load(Ordering::Relaxed),
            rejected_total: self.rejected_total.load(Ordering::Relaxed),
            fees_collected_cents: self.fees_collected_cents.load(Ordering::Relaxed),
            operations_per_sec,
            op_lat_buckets,
            op_lat_sum_us,
            avg_op_latency_us,
            max_op_latency_us: self.op_latency_max_us.load(Ordering::Relaxed),
            op_lat_p50_us: percentile_from_buckets(&op_lat_buckets, 0.50),
            op_lat_p99_us: percentile_from_buckets(&op_lat_buckets, 0.99),
            occupied_spots,
            total_spots,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of histogram buckets (exported for Prometheus formatting)
pub const METRICS_NUM_BUCKETS: usize = NUM_BUCKETS;
/// Exported bucket bounds for Prometheus formatting
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = BUCKET_BOUNDS;

#[derive(Debug)]
pub struct MetricsSummary {
    pub check_ins_total: u64,
    pub check_outs_total: u64,
    pub lot_full_total: u64,
    pub location_empty_total: u64,
    pub rejected_total: u64,
    pub fees_collected_cents: u64,
    pub operations_per_sec: f64,
    /// Lock hold time histogram buckets
    /// Bounds: ≤1, ≤2, ≤4, ≤8, ≤16, ≤32, ≤64, ≤128, ≤256, ≤512, >512 µs
    pub op_lat_buckets: [u64; NUM_BUCKETS],
    pub op_lat_sum_us: u64,
    pub avg_op_latency_us: u64,
    pub max_op_latency_us: u64,
    pub op_lat_p50_us: u64,
    pub op_lat_p99_us: u64,
    pub occupied_spots: usize,
    pub total_spots: u32,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            occupied = %self.occupied_spots,
            total = %self.total_spots,
            check_ins = %self.check_ins_total,
            check_outs = %self.check_outs_total,
            lot_full = %self.lot_full_total,
            location_empty = %self.location_empty_total,
            rejected = %self.rejected_total,
            fees_cents = %self.fees_collected_cents,
            ops_per_sec = format!("{:.1}", self.operations_per_sec),
            p50_us = %self.op_lat_p50_us,
            p99_us = %self.op_lat_p99_us,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.check_ins_total(), 0);
        assert_eq!(metrics.check_outs_total(), 0);
        assert_eq!(metrics.fees_collected_cents(), 0);
    }

    #[test]
    fn test_record_check_out_accumulates_fees() {
        let metrics = Metrics::new();
        metrics.record_check_out(1000);
        metrics.record_check_out(2050);

        assert_eq!(metrics.check_outs_total(), 2);
        assert_eq!(metrics.fees_collected_cents(), 3050);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(1), 0);
        assert_eq!(bucket_index(2), 1);
        assert_eq!(bucket_index(3), 2);
        assert_eq!(bucket_index(512), 9);
        assert_eq!(bucket_index(10_000), 10);
    }

    #[test]
    fn test_report_summary() {
        let metrics = Metrics::new();
        metrics.record_check_in();
        metrics.record_check_in();
        metrics.record_lot_full();
        metrics.record_location_empty();
        metrics.record_rejected();
        metrics.record_operation(3);
        metrics.record_operation(40);

        let summary = metrics.report(2, 10);
        assert_eq!(summary.check_ins_total, 2);
        assert_eq!(summary.lot_full_total, 1);
        assert_eq!(summary.location_empty_total, 1);
        assert_eq!(summary.rejected_total, 1);
        assert_eq!(summary.op_lat_buckets.iter().sum::<u64>(), 2);
        assert_eq!(summary.max_op_latency_us, 40);
        assert_eq!(summary.avg_op_latency_us, 21);
        assert_eq!(summary.occupied_spots, 2);
        assert_eq!(summary.total_spots, 10);
    }

    #[test]
    fn test_report_keeps_cumulative_histogram() {
        let metrics = Metrics::new();
        metrics.record_operation(5);
        let _ = metrics.report(0, 1);
        let summary = metrics.report(0, 1);

        assert_eq!(summary.op_lat_buckets.iter().sum::<u64>(), 1);
        assert_eq!(summary.operations_per_sec, 0.0);
    }

    #[test]
    fn test_snapshot_keeps_rate_window() {
        let metrics = Metrics::new();
        metrics.record_operation(5);
        metrics.record_operation(5);
        let _ = metrics.snapshot(0, 1);

        std::thread::sleep(Duration::from_millis(2));
        let summary = metrics.report(0, 1);
        assert!(summary.operations_per_sec > 0.0);
    }

    #[test]
    fn test_percentile_from_buckets() {
        let mut buckets = [0u64; NUM_BUCKETS];
        assert_eq!(percentile_from_buckets(&buckets, 0.99), 0);

        buckets[2] = 99;
        buckets[8] = 1;
        assert_eq!(percentile_from_buckets(&buckets, 0.50), 4);
        assert_eq!(percentile_from_buckets(&buckets, 0.99), 4);
        assert_eq!(percentile_from_buckets(&buckets, 1.0), 256);
    }
}
