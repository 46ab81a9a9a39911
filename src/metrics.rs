//! Metrics collection and reporting for production monitoring
//!
//! Tracks request counts, validation rejections, unknown-category
//! occurrences, and inference latency. Exposed in Prometheus format through
//! `GET /metrics`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Central metrics collector for tracking serving behavior
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    /// Total number of requests processed
    total_requests: Arc<AtomicUsize>,
    /// Total number of successful predictions
    successful_requests: Arc<AtomicUsize>,
    /// Total number of failed requests
    failed_requests: Arc<AtomicUsize>,
    /// Requests rejected with validation errors (subset of failed)
    validation_rejections: Arc<AtomicUsize>,
    /// Categorical values with no matching one-hot column (non-fatal)
    unknown_categories: Arc<AtomicUsize>,
    /// Total inference time in microseconds
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
            successful_requests: Arc::new(AtomicUsize::new(0)),
            failed_requests: Arc::new(AtomicUsize::new(0)),
            validation_rejections: Arc::new(AtomicUsize::new(0)),
            unknown_categories: Arc::new(AtomicUsize::new(0)),
            total_inference_time_us: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    #[allow(clippy::cast_possible_truncation)]
    pub fn record_success(&self, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        self.total_inference_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a failed request
    pub fn record_failure(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a validation rejection (also counts as a failure)
    pub fn record_validation_rejection(&self) {
        self.validation_rejections.fetch_add(1, Ordering::Relaxed);
        self.record_failure();
    }

    /// Record a categorical value that matched no one-hot column
    pub fn record_unknown_category(&self) {
        self.unknown_categories.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of metrics
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);
        let validation = self.validation_rejections.load(Ordering::Relaxed);
        let unknown = self.unknown_categories.load(Ordering::Relaxed);
        let total_time_us = self.total_inference_time_us.load(Ordering::Relaxed);
        let uptime = self.start_time.elapsed();

        MetricsSnapshot {
            total_requests,
            successful_requests: successful,
            failed_requests: failed,
            validation_rejections: validation,
            unknown_categories: unknown,
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
            "# HELP prever_requests_total Total number of requests\n\
             # TYPE prever_requests_total counter\n\
             prever_requests_total {}\n\
             # HELP prever_requests_successful Successful predictions\n\
             # TYPE prever_requests_successful counter\n\
             prever_requests_successful {}\n\
             # HELP prever_requests_failed Failed requests\n\
             # TYPE prever_requests_failed counter\n\
             prever_requests_failed {}\n\
             # HELP prever_validation_rejections Requests rejected for invalid payloads\n\
             # TYPE prever_validation_rejections counter\n\
             prever_validation_rejections {}\n\
             # HELP prever_unknown_categories Categorical values with no feature column\n\
             # TYPE prever_unknown_categories counter\n\
             prever_unknown_categories {}\n\
             # HELP prever_inference_time_seconds Total inference time\n\
             # TYPE prever_inference_time_seconds counter\n\
             prever_inference_time_seconds {:.6}\n\
             # HELP prever_requests_per_second Request rate\n\
             # TYPE prever_requests_per_second gauge\n\
             prever_requests_per_second {:.2}\n\
             # HELP prever_avg_latency_ms Average latency in milliseconds\n\
             # TYPE prever_avg_latency_ms gauge\n\
             prever_avg_latency_ms {:.2}\n\
             # HELP prever_error_rate Error rate (0.0-1.0)\n\
             # TYPE prever_error_rate gauge\n\
             prever_error_rate {:.4}\n\
             # HELP prever_uptime_seconds Uptime in seconds\n\
             # TYPE prever_uptime_seconds counter\n\
             prever_uptime_seconds {}\n",
            snapshot.total_requests,
            snapshot.successful_requests,
            snapshot.failed_requests,
            snapshot.validation_rejections,
            snapshot.unknown_categories,
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
        self.successful_requests.store(0, Ordering::Relaxed);
        self.failed_requests.store(0, Ordering::Relaxed);
        self.validation_rejections.store(0, Ordering::Relaxed);
        self.unknown_categories.store(0, Ordering::Relaxed);
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
    /// Total number of requests processed
    pub total_requests: usize,
    /// Number of successful predictions
    pub successful_requests: usize,
    /// Number of failed requests
    pub failed_requests: usize,
    /// Requests rejected for invalid payloads
    pub validation_rejections: usize,
    /// Categorical values with no matching feature column
    pub unknown_categories: usize,
    /// Total inference time in microseconds
    pub total_inference_time_us: u64,
    /// System uptime in seconds
    pub uptime_secs: u64,
    /// Request rate (requests per second)
    pub requests_per_sec: f64,
    /// Average request latency in milliseconds
    pub avg_latency_ms: f64,
    /// Error rate as a fraction (0.0 to 1.0)
    pub error_rate: f64,
}
