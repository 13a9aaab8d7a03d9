use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, Encoder, Histogram, IntCounter, TextEncoder,
};
use std::time::Instant;
use tracing::trace;

lazy_static! {
    // HTTP metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounter = register_int_counter!(
        "http_requests_total",
        "Total number of HTTP requests"
    ).unwrap();

    pub static ref HTTP_REQUESTS_SUCCESS: IntCounter = register_int_counter!(
        "http_requests_success_total",
        "Total number of successful HTTP requests"
    ).unwrap();

    pub static ref HTTP_REQUESTS_ERROR: IntCounter = register_int_counter!(
        "http_requests_error_total",
        "Total number of failed HTTP requests"
    ).unwrap();

    pub static ref HTTP_REQUEST_DURATION: Histogram = register_histogram!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds"
    ).unwrap();

    // Business metrics
    pub static ref CHECKOUT_SESSIONS_CREATED: IntCounter = register_int_counter!(
        "checkout_sessions_created_total",
        "Total number of checkout sessions created"
    ).unwrap();

    pub static ref CHECKOUT_SESSIONS_UPDATED: IntCounter = register_int_counter!(
        "checkout_sessions_updated_total",
        "Total number of checkout session updates"
    ).unwrap();

    pub static ref CHECKOUT_COMPLETIONS: IntCounter = register_int_counter!(
        "checkout_completions_total",
        "Total number of successful checkout completions"
    ).unwrap();

    pub static ref CHECKOUT_CANCELLATIONS: IntCounter = register_int_counter!(
        "checkout_cancellations_total",
        "Total number of checkout cancellations"
    ).unwrap();

    pub static ref ORDERS_CREATED: IntCounter = register_int_counter!(
        "orders_created_total",
        "Total number of orders created"
    ).unwrap();

    pub static ref PAYMENT_PROCESSING_SUCCESS: IntCounter = register_int_counter!(
        "payment_processing_success_total",
        "Total number of successful payment processings"
    ).unwrap();

    pub static ref PAYMENT_PROCESSING_FAILURE: IntCounter = register_int_counter!(
        "payment_processing_failure_total",
        "Total number of failed payment processings"
    ).unwrap();

    pub static ref SESSION_ROLLBACKS: IntCounter = register_int_counter!(
        "checkout_session_rollbacks_total",
        "Total number of completion attempts rolled back after failure"
    ).unwrap();
}

/// Record HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, started: Instant) {
    HTTP_REQUESTS_TOTAL.inc();

    trace!(
        http.method = method,
        http.path = path,
        http.status = status,
        latency_secs = started.elapsed().as_secs_f64(),
        "recording HTTP request metrics"
    );

    if status < 400 {
        HTTP_REQUESTS_SUCCESS.inc();
    } else {
        HTTP_REQUESTS_ERROR.inc();
    }

    HTTP_REQUEST_DURATION.observe(started.elapsed().as_secs_f64());
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        CHECKOUT_SESSIONS_CREATED.inc();
        assert!(CHECKOUT_SESSIONS_CREATED.get() > 0);
    }
}
