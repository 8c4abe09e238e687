use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use compactness::CleanOutcome;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use std::time::Duration;

/// A container for all Prometheus metric collectors for the clean service.
///
/// Wrapped in an `Arc` and shared by every request handler.
pub struct Metrics {
    pub registry: Registry,
    /// Total number of `/clean` requests that reached the filter.
    pub requests_total: IntCounter,
    /// Requests rejected because the body could not be decoded.
    pub requests_rejected_total: IntCounter,
    /// Features whose compactness index was computed.
    pub features_evaluated_total: IntCounter,
    /// Features reported back as ids to hide.
    pub features_hidden_total: IntCounter,
    /// Features skipped because their geometry could not be parsed.
    pub features_invalid_total: IntCounter,
    /// Features kept visible because their index is undefined.
    pub features_undefined_total: IntCounter,
    pub request_duration_seconds: Histogram,
}

impl Metrics {
    /// Creates and registers all collectors in a custom registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("clean_service".into()), None)?;

        macro_rules! reg {
            ($metric:expr) => {{
                let collector = $metric;
                registry.register(Box::new(collector.clone()))?;
                collector
            }};
        }

        Ok(Self {
            requests_total: reg!(IntCounter::new(
                "clean_requests_total",
                "Total number of clean requests processed"
            )?),
            requests_rejected_total: reg!(IntCounter::new(
                "clean_requests_rejected_total",
                "Total number of clean requests with an invalid body"
            )?),
            features_evaluated_total: reg!(IntCounter::new(
                "features_evaluated_total",
                "Total number of features with a computed compactness index"
            )?),
            features_hidden_total: reg!(IntCounter::new(
                "features_hidden_total",
                "Total number of features returned as ids to hide"
            )?),
            features_invalid_total: reg!(IntCounter::new(
                "features_invalid_total",
                "Total number of features skipped for invalid geometry"
            )?),
            features_undefined_total: reg!(IntCounter::new(
                "features_undefined_total",
                "Total number of features with an undefined compactness index"
            )?),
            request_duration_seconds: reg!(Histogram::with_opts(
                HistogramOpts::new(
                    "clean_request_duration_seconds",
                    "Time spent filtering one clean request"
                )
                .buckets(prometheus::exponential_buckets(0.0005, 2.0, 14)?)
            )?),
            registry,
        })
    }

    pub fn record(&self, outcome: &CleanOutcome, elapsed: Duration) {
        self.requests_total.inc();
        self.features_evaluated_total.inc_by(outcome.evaluated);
        self.features_hidden_total.inc_by(outcome.ids_to_hide.len() as u64);
        self.features_invalid_total.inc_by(outcome.invalid);
        self.features_undefined_total.inc_by(outcome.undefined);
        self.request_duration_seconds.observe(elapsed.as_secs_f64());
    }

    /// Creates an `axum::Router` that serves the metrics on the `/metrics` endpoint.
    pub fn router(&self) -> Router {
        let registry = self.registry.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let registry = registry.clone();
                async move {
                    let metric_families = registry.gather();
                    let mut buffer = Vec::new();
                    match TextEncoder::new().encode(&metric_families, &mut buffer) {
                        Ok(()) => String::from_utf8_lossy(&buffer).into_owned().into_response(),
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode metrics");
                            StatusCode::INTERNAL_SERVER_ERROR.into_response()
                        }
                    }
                }
            }),
        )
    }
}
