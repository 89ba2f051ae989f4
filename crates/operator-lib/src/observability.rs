//! Observability infrastructure for the admission webhook
//!
//! Provides:
//! - Prometheus metrics (admission latency and outcomes, chart render latency and errors)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Admission handling buckets (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Chart renders include a download, so they get wider buckets
const RENDER_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<WebhookMetricsInner> = OnceLock::new();

struct WebhookMetricsInner {
    admission_latency_seconds: HistogramVec,
    admissions: IntCounterVec,
    template_render_seconds: Histogram,
    template_errors: IntCounter,
    decode_skips: IntCounter,
}

impl WebhookMetricsInner {
    fn new() -> Self {
        Self {
            admission_latency_seconds: register_histogram_vec!(
                "agent_webhook_admission_latency_seconds",
                "Time spent handling one admission review",
                &["webhook"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register admission_latency_seconds"),

            admissions: register_int_counter_vec!(
                "agent_webhook_admission_total",
                "Admission reviews handled, by outcome",
                &["webhook", "result"]
            )
            .expect("Failed to register admission_total"),

            template_render_seconds: register_histogram!(
                "agent_webhook_template_render_seconds",
                "Time spent rendering the collector chart",
                RENDER_BUCKETS.to_vec()
            )
            .expect("Failed to register template_render_seconds"),

            template_errors: register_int_counter!(
                "agent_webhook_template_errors_total",
                "Chart fetch, load or render failures"
            )
            .expect("Failed to register template_errors"),

            decode_skips: register_int_counter!(
                "agent_webhook_decode_skips_total",
                "Rendered documents skipped because they failed to decode"
            )
            .expect("Failed to register decode_skips"),
        }
    }
}

/// Webhook metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct WebhookMetrics {
    _private: (),
}

impl Default for WebhookMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(WebhookMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &WebhookMetricsInner {
        GLOBAL_METRICS.get_or_init(WebhookMetricsInner::new)
    }

    /// Record one handled admission review
    pub fn observe_admission(&self, webhook: &str, result: &str, duration_secs: f64) {
        let inner = self.inner();
        inner
            .admission_latency_seconds
            .with_label_values(&[webhook])
            .observe(duration_secs);
        inner.admissions.with_label_values(&[webhook, result]).inc();
    }

    pub fn observe_template_render(&self, duration_secs: f64) {
        self.inner().template_render_seconds.observe(duration_secs);
    }

    pub fn inc_template_errors(&self) {
        self.inner().template_errors.inc();
    }

    pub fn inc_decode_skips(&self) {
        self.inner().decode_skips.inc();
    }

    /// Text exposition of the global registry
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for webhook events
///
/// Provides consistent JSON-formatted logging for admissions and
/// lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    distro: String,
}

impl StructuredLogger {
    pub fn new(distro: impl Into<String>) -> Self {
        Self {
            distro: distro.into(),
        }
    }

    pub fn log_startup(&self, version: &str, chart_source: &str) {
        info!(
            event = "webhook_started",
            distro = %self.distro,
            version = %version,
            chart_source = %chart_source,
            "Agent admission webhook started"
        );
    }

    /// Log a successful defaulting pass
    pub fn log_defaulted(&self, uid: &str, name: &str, namespace: &str, patch_ops: usize) {
        info!(
            event = "agent_defaulted",
            distro = %self.distro,
            uid = %uid,
            name = %name,
            namespace = %namespace,
            patch_ops = patch_ops,
            "Applied Agent defaults"
        );
    }

    pub fn log_rejected(&self, uid: &str, name: &str, namespace: &str, violations: &[String]) {
        warn!(
            event = "agent_rejected",
            uid = %uid,
            name = %name,
            namespace = %namespace,
            violations = violations.len(),
            reason = %violations.join("; "),
            "Rejected invalid Agent"
        );
    }

    /// Log an admission denied because defaults could not be produced
    pub fn log_defaulting_unavailable(&self, uid: &str, name: &str, namespace: &str, err: &str) {
        error!(
            event = "defaulting_unavailable",
            distro = %self.distro,
            uid = %uid,
            name = %name,
            namespace = %namespace,
            error = %err,
            "Defaults unavailable, denying admission"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "webhook_shutdown",
            reason = %reason,
            "Agent admission webhook shutting down"
        );
    }
}
