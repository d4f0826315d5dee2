//! Prometheus metrics registry for the toolroom custody service.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and pass it
//! to the scheduler and HTTP middleware.
//!
//! Exposed at `GET /metrics` in Prometheus text exposition format
//! (`text/plain; version=0.0.4`).

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, Opts, Registry};

use crate::error::{CustodyError, CustodyResult};
use crate::rules::{CalibrationSummary, OverdueSummary};

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Custody operations, labelled by operation and outcome.
    pub custody_operations_total: CounterVec,
    /// Rule passes run, labelled by check.
    pub rule_checks_total: CounterVec,
    /// Rule passes that failed, labelled by check.
    pub rule_check_errors_total: CounterVec,
    /// Alerts raised by the rules engine, labelled by alert type.
    pub alerts_created_total: CounterVec,
    /// Assets suspended because their calibration expired.
    pub assets_suspended_total: Counter,
    /// HTTP request count, labelled by method, path, and status code.
    pub http_requests_total: CounterVec,
    /// HTTP request latency histogram in seconds.
    pub http_request_duration: Histogram,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics. Returns an error if any metric
    /// name is invalid or duplicated.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let custody_operations_total = CounterVec::new(
            Opts::new(
                "toolroom_custody_operations_total",
                "Custody operations by operation and outcome",
            ),
            &["operation", "outcome"],
        )?;

        let rule_checks_total = CounterVec::new(
            Opts::new("toolroom_rule_checks_total", "Rule passes run"),
            &["check"],
        )?;

        let rule_check_errors_total = CounterVec::new(
            Opts::new("toolroom_rule_check_errors_total", "Rule passes that failed"),
            &["check"],
        )?;

        let alerts_created_total = CounterVec::new(
            Opts::new("toolroom_alerts_created_total", "Alerts raised by rule passes"),
            &["alert_type"],
        )?;

        let assets_suspended_total = Counter::with_opts(Opts::new(
            "toolroom_assets_suspended_total",
            "Assets suspended for expired calibration",
        ))?;

        let http_requests_total = CounterVec::new(
            Opts::new(
                "toolroom_http_requests_total",
                "HTTP requests by method, path, and status",
            ),
            &["method", "path", "status"],
        )?;

        let http_request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "toolroom_http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        registry.register(Box::new(custody_operations_total.clone()))?;
        registry.register(Box::new(rule_checks_total.clone()))?;
        registry.register(Box::new(rule_check_errors_total.clone()))?;
        registry.register(Box::new(alerts_created_total.clone()))?;
        registry.register(Box::new(assets_suspended_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            custody_operations_total,
            rule_checks_total,
            rule_check_errors_total,
            alerts_created_total,
            assets_suspended_total,
            http_requests_total,
            http_request_duration,
            registry,
        })
    }

    /// Count one custody operation.
    ///
    /// Refusals (not found, conflict, forbidden) count as `rejected`; store
    /// failures count as `error`.
    pub fn record_custody<T>(&self, operation: &str, result: &CustodyResult<T>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(CustodyError::Store(_)) => "error",
            Err(_) => "rejected",
        };
        self.custody_operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn record_overdue_pass(&self, summary: &OverdueSummary) {
        self.rule_checks_total.with_label_values(&["overdue"]).inc();
        self.alerts_created_total
            .with_label_values(&["OVERDUE_RETURN"])
            .inc_by(summary.alerts_created as f64);
    }

    pub fn record_calibration_pass(&self, summary: &CalibrationSummary) {
        self.rule_checks_total.with_label_values(&["calibration"]).inc();
        self.alerts_created_total
            .with_label_values(&["CALIBRATION"])
            .inc_by(summary.alerts_created as f64);
        self.assets_suspended_total
            .inc_by(summary.assets_suspended as f64);
    }

    /// Render all metrics as Prometheus text format (for the `/metrics` endpoint).
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}

/// Middleware recording request count and latency.
///
/// The path label is the matched route template, so `/alerts/:id/resolve`
/// stays one series regardless of the id.
pub async fn track_http(
    State(metrics): State<Arc<AppMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    metrics
        .http_request_duration
        .observe(start.elapsed().as_secs_f64());
    metrics
        .http_requests_total
        .with_label_values(&[&method, &path, response.status().as_str()])
        .inc();
    response
}
