//! Process-wide Prometheus collectors, registered in the default registry
//! and rendered by `/metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::future::Future;
use std::time::Instant;

const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

lazy_static! {
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "edufix_http_requests_total",
        "HTTP requests by method, route and status",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "edufix_http_request_duration_seconds",
        "HTTP request latency by method and route",
        &["method", "path"],
        LATENCY_BUCKETS.to_vec()
    )
    .unwrap();

    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "edufix_store_operations_total",
        "Store calls by operation, collection and outcome",
        &["operation", "collection", "outcome"]
    )
    .unwrap();

    pub static ref STORE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "edufix_store_operation_duration_seconds",
        "Store call latency by operation and collection",
        &["operation", "collection"],
        LATENCY_BUCKETS.to_vec()
    )
    .unwrap();

    pub static ref QUESTIONS_SERVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "edufix_questions_served_total",
        "Adaptive selections by question difficulty",
        &["difficulty"]
    )
    .unwrap();

    pub static ref ANSWERS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "edufix_answers_submitted_total",
        "Evaluated answers by correctness",
        &["correct"]
    )
    .unwrap();

    pub static ref HINTS_REQUESTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "edufix_hints_requested_total",
        "Hints served by level",
        &["hint_level"]
    )
    .unwrap();

    pub static ref INTERVENTION_TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "edufix_intervention_transitions_total",
        "Intervention status changes, including creation",
        &["status"]
    )
    .unwrap();

    pub static ref ACCESS_DENIED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "edufix_access_denied_total",
        "Requests rejected by the capability gate",
        &["operation"]
    )
    .unwrap();
}

pub fn render_metrics() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Awaits a store call, recording its outcome and latency.
pub async fn observe_store<T>(
    operation: &str,
    collection: &str,
    call: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    let started = Instant::now();
    let result = call.await;

    let outcome = match &result {
        Ok(_) => "ok",
        Err(_) => "error",
    };
    STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, outcome])
        .inc();
    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(started.elapsed().as_secs_f64());

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_output_includes_touched_counters() {
        HINTS_REQUESTED_TOTAL.with_label_values(&["2"]).inc();

        let output = render_metrics().unwrap();
        assert!(output.contains("edufix_hints_requested_total"));
    }

    #[tokio::test]
    async fn store_failures_are_counted() {
        let errors = || {
            STORE_OPERATIONS_TOTAL
                .with_label_values(&["find", "metrics_test", "error"])
                .get()
        };
        let before = errors();

        let result = observe_store::<()>("find", "metrics_test", async {
            Err(anyhow::anyhow!("connection reset"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(errors(), before + 1);
    }
}
