//! Metrics collection and reporting for production monitoring
//!
//! Tracks request volume, validation failures, and encode+predict latency.
//! Counters are atomics shared freely across handlers; metrics are exposed
//! in Prometheus text format on `/metrics`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Central metrics collector for tracking serving performance
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    /// Total number of prediction requests processed
    total_requests: Arc<AtomicUsize>,
    /// Requests that produced a prediction
    successful_predictions: Arc<AtomicUsize>,
    /// Requests rejected during decode, encoding, or inference
    validation_failures: Arc<AtomicUsize>,
    /// Total encode+predict time in microseconds
    total_inference_time_us: Arc<AtomicU64>,
    /// Start time for rate calculations
    start_time: Instant,
}

impl MetricsCollector {
    /// Create a new metrics collector
    #[must_use]
    pub fn new() -> Self {
        Self {
            total_requests: Arc::new(AtomicUsize::new(0)),
            successful_predictions: Arc::new(AtomicUsize::new(0)),
            validation_failures: Arc::new(AtomicUsize::new(0)),
            total_inference_time_us: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Record a request that produced a prediction
    #[allow(clippy::cast_possible_truncation)]
    pub fn record_success(&self, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_predictions.fetch_add(1, Ordering::Relaxed);
        self.total_inference_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a request rejected with a validation error
    pub fn record_validation_failure(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of metrics
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_predictions.load(Ordering::Relaxed);
        let failed = self.validation_failures.load(Ordering::Relaxed);
        let total_time_us = self.total_inference_time_us.load(Ordering::Relaxed);
        let uptime = self.start_time.elapsed();

        MetricsSnapshot {
            total_requests,
            successful_predictions: successful,
            validation_failures: failed,
            total_inference_time_us: total_time_us,
            uptime_secs: uptime.as_secs(),
            requests_per_sec: if uptime.as_secs() > 0 {
                total_requests as f64 / uptime.as_secs_f64()
            } else {
                0.0
            },
            avg_latency_ms: if successful > 0 {
                (total_time_us as f64 / 1000.0) / successful as f64
            } else {
                0.0
            },
            error_rate: if total_requests > 0 {
                failed as f64 / total_requests as f64
            } else {
                0.0
            },
        }
    }

    /// Export metrics in Prometheus format
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            "# HELP tasar_requests_total Total number of prediction requests\n\
             # TYPE tasar_requests_total counter\n\
             tasar_requests_total {}\n\
             # HELP tasar_predictions_successful Requests that produced a prediction\n\
             # TYPE tasar_predictions_successful counter\n\
             tasar_predictions_successful {}\n\
             # HELP tasar_validation_failures Requests rejected with a validation error\n\
             # TYPE tasar_validation_failures counter\n\
             tasar_validation_failures {}\n\
             # HELP tasar_inference_time_seconds Total encode and predict time\n\
             # TYPE tasar_inference_time_seconds counter\n\
             tasar_inference_time_seconds {:.6}\n\
             # HELP tasar_requests_per_second Request rate\n\
             # TYPE tasar_requests_per_second gauge\n\
             tasar_requests_per_second {:.2}\n\
             # HELP tasar_avg_latency_ms Average encode and predict latency in milliseconds\n\
             # TYPE tasar_avg_latency_ms gauge\n\
             tasar_avg_latency_ms {:.2}\n\
             # HELP tasar_error_rate Validation failure rate (0.0-1.0)\n\
             # TYPE tasar_error_rate gauge\n\
             tasar_error_rate {:.4}\n\
             # HELP tasar_uptime_seconds Uptime in seconds\n\
             # TYPE tasar_uptime_seconds counter\n\
             tasar_uptime_seconds {}\n",
            snapshot.total_requests,
            snapshot.successful_predictions,
            snapshot.validation_failures,
            snapshot.total_inference_time_us as f64 / 1_000_000.0,
            snapshot.requests_per_sec,
            snapshot.avg_latency_ms,
            snapshot.error_rate,
            snapshot.uptime_secs
        )
    }

    /// Reset all metrics (useful for testing)
    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.successful_predictions.store(0, Ordering::Relaxed);
        self.validation_failures.store(0, Ordering::Relaxed);
        self.total_inference_time_us.store(0, Ordering::Relaxed);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Total number of prediction requests processed
    pub total_requests: usize,
    /// Requests that produced a prediction
    pub successful_predictions: usize,
    /// Requests rejected with a validation error
    pub validation_failures: usize,
    /// Total encode+predict time in microseconds
    pub total_inference_time_us: u64,
    /// System uptime in seconds
    pub uptime_secs: u64,
    /// Request rate (requests per second)
    pub requests_per_sec: f64,
    /// Average encode+predict latency in milliseconds
    pub avg_latency_ms: f64,
    /// Validation failure rate as a fraction (0.0 to 1.0)
    pub error_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let metrics = MetricsCollector::new();
        let snapshot = metrics.snapshot();

        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.successful_predictions, 0);
        assert_eq!(snapshot.validation_failures, 0);
        assert_eq!(snapshot.total_inference_time_us, 0);
    }

    #[test]
    fn test_record_success() {
        let metrics = MetricsCollector::new();
        metrics.record_success(Duration::from_millis(100));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.successful_predictions, 1);
        assert_eq!(snapshot.validation_failures, 0);
        assert!(snapshot.total_inference_time_us >= 100_000);
    }

    #[test]
    fn test_record_validation_failure() {
        let metrics = MetricsCollector::new();
        metrics.record_validation_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.successful_predictions, 0);
        assert_eq!(snapshot.validation_failures, 1);
        assert_eq!(snapshot.error_rate, 1.0);
    }

    #[test]
    fn test_mixed_requests() {
        let metrics = MetricsCollector::new();

        metrics.record_success(Duration::from_millis(50));
        metrics.record_success(Duration::from_millis(100));
        metrics.record_validation_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.successful_predictions, 2);
        assert_eq!(snapshot.validation_failures, 1);
        assert_eq!(snapshot.error_rate, 1.0 / 3.0);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = MetricsCollector::new();
        let clone = metrics.clone();

        clone.record_success(Duration::from_millis(10));
        assert_eq!(metrics.snapshot().total_requests, 1);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = MetricsCollector::new();
        metrics.record_success(Duration::from_millis(20));
        metrics.record_validation_failure();

        let output = metrics.to_prometheus();
        assert!(output.contains("tasar_requests_total 2"));
        assert!(output.contains("tasar_predictions_successful 1"));
        assert!(output.contains("tasar_validation_failures 1"));
        assert!(output.contains("# TYPE tasar_requests_total counter"));
        assert!(output.contains("# TYPE tasar_error_rate gauge"));
    }

    #[test]
    fn test_reset() {
        let metrics = MetricsCollector::new();
        metrics.record_success(Duration::from_millis(5));
        metrics.record_validation_failure();
        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.successful_predictions, 0);
        assert_eq!(snapshot.validation_failures, 0);
    }

    #[test]
    fn test_avg_latency_calculation() {
        let metrics = MetricsCollector::new();

        metrics.record_success(Duration::from_millis(100));
        metrics.record_success(Duration::from_millis(200));

        let snapshot = metrics.snapshot();
        assert!((snapshot.avg_latency_ms - 150.0).abs() < 5.0);
    }

    #[test]
    fn test_failures_do_not_skew_latency() {
        let metrics = MetricsCollector::new();
        metrics.record_success(Duration::from_millis(100));
        metrics.record_validation_failure();

        // Latency averages over successes only.
        let snapshot = metrics.snapshot();
        assert!((snapshot.avg_latency_ms - 100.0).abs() < 5.0);
    }
}
