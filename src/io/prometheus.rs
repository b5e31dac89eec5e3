//! Prometheus text exposition for lot metrics
//!
//! Served at `GET /metrics` by the HTTP front end.

use crate::infra::metrics::{MetricsSummary, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS};
use std::fmt::Write;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge)
fn write_metric(output: &mut String, name: &str, help: &str, typ: MetricType, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    bounds: &[u64; 10],
    sum: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in bounds.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{le=\"+Inf\"}} {cumulative}");
    let _ = writeln!(output, "{name}_sum {sum}");
    let _ = writeln!(output, "{name}_count {cumulative}");
}

/// Format a metrics snapshot in Prometheus text exposition format
pub fn format_prometheus_metrics(summary: &MetricsSummary) -> String {
    let mut output = String::with_capacity(4096);

    write_lot_metrics(&mut output, summary);
    write_rejection_metrics(&mut output, summary);
    write_latency_metrics(&mut output, summary);

    output
}

fn write_lot_metrics(output: &mut String, summary: &MetricsSummary) {
    write_metric(
        output,
        "parking_check_ins_total",
        "Cars checked in",
        MetricType::Counter,
        summary.check_ins_total,
    );
    write_metric(
        output,
        "parking_check_outs_total",
        "Cars checked out",
        MetricType::Counter,
        summary.check_outs_total,
    );
    write_metric(
        output,
        "parking_fees_collected_cents_total",
        "Fees charged at check-out, in cents",
        MetricType::Counter,
        summary.fees_collected_cents,
    );
    write_metric(
        output,
        "parking_occupied_spots",
        "Spots currently holding an open ticket",
        MetricType::Gauge,
        summary.occupied_spots as u64,
    );
    write_metric(
        output,
        "parking_total_spots",
        "Configured lot size",
        MetricType::Gauge,
        u64::from(summary.total_spots),
    );
}

fn write_rejection_metrics(output: &mut String, summary: &MetricsSummary) {
    write_metric(
        output,
        "parking_lot_full_total",
        "Check-ins refused because no spot was free",
        MetricType::Counter,
        summary.lot_full_total,
    );
    write_metric(
        output,
        "parking_location_empty_total",
        "Check-outs of a spot with no car",
        MetricType::Counter,
        summary.location_empty_total,
    );
    write_metric(
        output,
        "parking_rejected_requests_total",
        "Requests rejected for invalid input",
        MetricType::Counter,
        summary.rejected_total,
    );
}

fn write_latency_metrics(output: &mut String, summary: &MetricsSummary) {
    write_histogram(
        output,
        "parking_operation_latency_us",
        "Lot mutation latency in microseconds",
        &summary.op_lat_buckets,
        &METRICS_BUCKET_BOUNDS,
        summary.op_lat_sum_us,
    );
    write_metric(
        output,
        "parking_operation_latency_p99_us",
        "99th percentile lot mutation latency",
        MetricType::Gauge,
        summary.op_lat_p99_us,
    );
    write_metric(
        output,
        "parking_operation_latency_max_us",
        "Maximum lot mutation latency",
        MetricType::Gauge,
        summary.max_op_latency_us,
    );
}
