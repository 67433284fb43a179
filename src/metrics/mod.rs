/// Prometheus metrics for the retention service.
///
/// Covers HTTP traffic, prediction outcomes per risk tier and marketing
/// webhook delivery. All collectors live in one process-wide registry that
/// `GET /metrics` exports in the text exposition format.
///
/// # Example
/// ```no_run
/// use customer_retention_service::metrics::PREDICTIONS_TOTAL;
///
/// PREDICTIONS_TOTAL.with_label_values(&["high"]).inc();
/// ```

pub mod middleware;

pub use middleware::track_metrics;

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
};

const NAMESPACE: &str = "customer_retention";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // HTTP Metrics
    // ============================================================================

    /// Total number of HTTP requests received
    ///
    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// HTTP request duration in seconds
    ///
    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    // ============================================================================
    // Prediction Metrics
    // ============================================================================

    /// Total number of successful predictions
    ///
    /// Labels: risk_tier
    pub static ref PREDICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("predictions_total", "Total number of churn predictions served")
            .namespace(NAMESPACE),
        &["risk_tier"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Total number of rejected or failed predictions
    ///
    /// Labels: kind (validation, model_unavailable, internal)
    pub static ref PREDICTION_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("prediction_errors_total", "Total number of failed prediction requests")
            .namespace(NAMESPACE),
        &["kind"]
    ).expect("Failed to create PREDICTION_ERRORS_TOTAL metric");

    /// End-to-end prediction latency, including webhook dispatch
    pub static ref PREDICTION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "prediction_duration_seconds",
            "Prediction processing duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    ).expect("Failed to create PREDICTION_DURATION_SECONDS metric");

    // ============================================================================
    // Marketing Webhook Metrics
    // ============================================================================

    /// Dispatch outcomes
    ///
    /// Labels: outcome (sent, skipped, failed)
    pub static ref WEBHOOK_DISPATCH_TOTAL: CounterVec = CounterVec::new(
        Opts::new("webhook_dispatch_total", "Marketing webhook dispatch outcomes")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create WEBHOOK_DISPATCH_TOTAL metric");

    /// Individual HTTP attempts made against the marketing webhook
    pub static ref WEBHOOK_ATTEMPTS_TOTAL: Counter = Counter::with_opts(
        Opts::new("webhook_attempts_total", "Marketing webhook HTTP attempts")
            .namespace(NAMESPACE)
    ).expect("Failed to create WEBHOOK_ATTEMPTS_TOTAL metric");

    // ============================================================================
    // System Metrics
    // ============================================================================

    /// Build information
    ///
    /// Labels: version
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Build information").namespace(NAMESPACE),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");

    /// 1 when a churn model is loaded
    pub static ref MODEL_LOADED: Gauge = Gauge::with_opts(
        Opts::new("model_loaded", "Whether a churn model is loaded").namespace(NAMESPACE)
    ).expect("Failed to create MODEL_LOADED metric");
}

fn register<C>(collector: C) -> Result<(), prometheus::Error>
where
    C: prometheus::core::Collector + 'static,
{
    match PROMETHEUS_REGISTRY.register(Box::new(collector)) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Register every collector with the global registry.
///
/// Safe to call more than once; already-registered collectors are skipped.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    register(HTTP_REQUESTS_TOTAL.clone())?;
    register(HTTP_REQUEST_DURATION_SECONDS.clone())?;

    register(PREDICTIONS_TOTAL.clone())?;
    register(PREDICTION_ERRORS_TOTAL.clone())?;
    register(PREDICTION_DURATION_SECONDS.clone())?;

    register(WEBHOOK_DISPATCH_TOTAL.clone())?;
    register(WEBHOOK_ATTEMPTS_TOTAL.clone())?;

    register(BUILD_INFO.clone())?;
    register(MODEL_LOADED.clone())?;

    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Generate Prometheus text format metrics
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
