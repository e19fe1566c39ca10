// Prometheus metrics for evaluations

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};
use judgeflow_common::types::{EvaluationScope, Outcome};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Encoder, Histogram,
    IntCounterVec, IntGauge, TextEncoder,
};
use std::time::Duration;
use tracing::error;

lazy_static! {
    static ref EVALUATIONS: IntCounterVec = register_int_counter_vec!(
        "judgeflow_evaluations_total",
        "Completed evaluations by scope and outcome",
        &["scope", "outcome"]
    )
    .expect("evaluations counter registers once");
    static ref EVALUATION_ERRORS: IntCounterVec = register_int_counter_vec!(
        "judgeflow_evaluation_errors_total",
        "Evaluations that ended without a verdict, by error code",
        &["code"]
    )
    .expect("errors counter registers once");
    static ref POLL_ATTEMPTS: Histogram = register_histogram!(
        "judgeflow_poll_attempts",
        "Status queries needed before every submission was terminal",
        vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 40.0]
    )
    .expect("poll attempts histogram registers once");
    static ref EVALUATION_SECONDS: Histogram = register_histogram!(
        "judgeflow_evaluation_seconds",
        "Wall-clock time of successful evaluations",
        vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]
    )
    .expect("evaluation duration histogram registers once");
    static ref IN_FLIGHT: IntGauge = register_int_gauge!(
        "judgeflow_evaluations_in_flight",
        "Evaluations currently holding a concurrency permit"
    )
    .expect("in-flight gauge registers once");
}

pub fn record_evaluation(scope: EvaluationScope, outcome: Outcome, attempts: u32, elapsed: Duration) {
    EVALUATIONS
        .with_label_values(&[&scope.to_string(), &outcome.to_string()])
        .inc();
    POLL_ATTEMPTS.observe(attempts as f64);
    EVALUATION_SECONDS.observe(elapsed.as_secs_f64());
}

pub fn record_error(code: &str) {
    EVALUATION_ERRORS.with_label_values(&[code]).inc();
}

/// Counts an evaluation as in flight until dropped
pub struct InFlight(());

impl InFlight {
    pub fn start() -> Self {
        IN_FLIGHT.inc();
        InFlight(())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        IN_FLIGHT.dec();
    }
}

fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    match render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
