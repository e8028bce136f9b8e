//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency, errors) are recorded in
//! middleware. Domain-level gauges (catalogue size, ledger size, active
//! users) are updated on each `/metrics` scrape (pull model) — see the
//! metrics handler in `lib.rs`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder, core::Collector,
};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // -- HTTP middleware metrics (push model) --
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    // -- Domain gauges (pull model, updated on /metrics scrape) --
    normas_total: prometheus::Gauge,
    normas_aplicaveis: prometheus::Gauge,
    aprovacoes_total: prometheus::Gauge,
    usuarios_ativos: prometheus::Gauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

impl ApiMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("normas_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let http_request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "normas_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "path"],
        )
        .expect("metric can be created");

        let http_errors_total = IntCounterVec::new(
            Opts::new("normas_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let normas_total = prometheus::Gauge::new(
            "normas_catalogo_total",
            "Total normas in the catalogue store",
        )
        .expect("metric can be created");

        let normas_aplicaveis = prometheus::Gauge::new(
            "normas_catalogo_aplicaveis",
            "Normas currently flagged applicable",
        )
        .expect("metric can be created");

        let aprovacoes_total = prometheus::Gauge::new(
            "normas_aprovacoes_total",
            "Total approval events in the ledger",
        )
        .expect("metric can be created");

        let usuarios_ativos = prometheus::Gauge::new(
            "normas_usuarios_ativos",
            "Active user accounts",
        )
        .expect("metric can be created");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_errors_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(normas_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(normas_aplicaveis.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(aprovacoes_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(usuarios_ativos.clone()))
            .expect("metric can be registered");

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                normas_total,
                normas_aplicaveis,
                aprovacoes_total,
                usuarios_ativos,
            }),
        }
    }

    /// Current total request count (sum across all labels).
    pub fn requests(&self) -> u64 {
        let mut total = 0u64;
        for mf in &self.inner.http_requests_total.collect() {
            for m in mf.get_metric() {
                total += m.get_counter().get_value() as u64;
            }
        }
        total
    }

    /// Current total error count (sum across all labels).
    pub fn errors(&self) -> u64 {
        let mut total = 0u64;
        for mf in &self.inner.http_errors_total.collect() {
            for m in mf.get_metric() {
                total += m.get_counter().get_value() as u64;
            }
        }
        total
    }

    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();

        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);

        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    // -- Domain gauge accessors (used by the /metrics handler) --

    pub fn normas_total(&self) -> &prometheus::Gauge {
        &self.inner.normas_total
    }

    pub fn normas_aplicaveis(&self) -> &prometheus::Gauge {
        &self.inner.normas_aplicaveis
    }

    pub fn aprovacoes_total(&self) -> &prometheus::Gauge {
        &self.inner.aprovacoes_total
    }

    pub fn usuarios_ativos(&self) -> &prometheus::Gauge {
        &self.inner.usuarios_ativos
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer)
            .map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a request path by replacing numeric id segments with `{id}`,
/// preventing cardinality explosion in Prometheus labels.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records HTTP request metrics via Prometheus.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let duration = start.elapsed().as_secs_f64();
        let status = response.status().as_u16();
        m.record_request(&method, &path, status, duration);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_start_at_zero() {
        let m = ApiMetrics::new();
        assert_eq!(m.requests(), 0);
        assert_eq!(m.errors(), 0);
    }

    #[test]
    fn requests_and_errors_increment_independently() {
        let m = ApiMetrics::new();
        for _ in 0..5 {
            m.record_request("GET", "/normas", 200, 0.01);
        }
        m.record_request("GET", "/normas/{id}", 404, 0.05);
        m.record_request("POST", "/normas", 400, 0.05);
        assert_eq!(m.requests(), 7);
        assert_eq!(m.errors(), 2);
    }

    #[test]
    fn clone_shares_underlying_counters() {
        let m = ApiMetrics::new();
        let clone = m.clone();
        m.record_request("GET", "/normas", 200, 0.01);
        assert_eq!(clone.requests(), 1);
    }

    #[test]
    fn gather_and_encode_produces_text() {
        let m = ApiMetrics::new();
        m.record_request("GET", "/normas", 200, 0.01);
        let output = m.gather_and_encode().unwrap();
        assert!(output.contains("normas_http_requests_total"));
        assert!(output.contains("normas_http_request_duration_seconds"));
    }

    #[test]
    fn normalize_path_replaces_numeric_ids() {
        assert_eq!(normalize_path("/normas/42"), "/normas/{id}");
        assert_eq!(
            normalize_path("/normas/42/aprovacoes"),
            "/normas/{id}/aprovacoes"
        );
        assert_eq!(normalize_path("/normas/stats"), "/normas/stats");
    }

    #[test]
    fn domain_gauges_update() {
        let m = ApiMetrics::new();
        m.normas_total().set(128.0);
        m.aprovacoes_total().set(12.0);
        let output = m.gather_and_encode().unwrap();
        assert!(output.contains("normas_catalogo_total"));
        assert!(output.contains("normas_aprovacoes_total"));
    }
}
