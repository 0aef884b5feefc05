//! Prometheus metrics for the recommendation service

use actix_web::{HttpResponse, Responder};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, TextEncoder,
};
use std::time::Duration;

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )
    .and_then(|c| {
        prometheus::default_registry().register(Box::new(c.clone()))?;
        Ok(c)
    })
    .unwrap_or_else(|e| {
        tracing::error!("failed to create http_requests counter: {}", e);
        IntCounterVec::new(Opts::new("dummy_http_requests", "dummy"), &["method", "path", "status"])
            .expect("dummy counter")
    })
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        ),
        &["method", "path"],
    )
    .and_then(|h| {
        prometheus::default_registry().register(Box::new(h.clone()))?;
        Ok(h)
    })
    .unwrap_or_else(|e| {
        tracing::error!("failed to create http_request_duration histogram: {}", e);
        HistogramVec::new(
            HistogramOpts::new("dummy_http_request_duration_seconds", "dummy"),
            &["method", "path"],
        )
        .expect("dummy histogram")
    })
});

static RESULT_CACHE_LOOKUPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "result_cache_lookups_total",
            "Result cache lookups by outcome",
        ),
        &["outcome"],
    )
    .and_then(|c| {
        prometheus::default_registry().register(Box::new(c.clone()))?;
        Ok(c)
    })
    .unwrap_or_else(|e| {
        tracing::error!("failed to create result_cache_lookups counter: {}", e);
        IntCounterVec::new(Opts::new("dummy_result_cache_lookups", "dummy"), &["outcome"])
            .expect("dummy counter")
    })
});

/// Handler that serialises Prometheus metrics in text format.
pub async fn serve_metrics() -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => HttpResponse::Ok()
            .content_type(encoder.format_type())
            .body(buffer),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(elapsed.as_secs_f64());
}

pub fn observe_cache_lookup(hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    RESULT_CACHE_LOOKUPS_TOTAL
        .with_label_values(&[outcome])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observers_do_not_panic() {
        observe_http_request("POST", "/api/v1/recommendations", 200, Duration::from_millis(5));
        observe_cache_lookup(true);
        observe_cache_lookup(false);
    }
}
