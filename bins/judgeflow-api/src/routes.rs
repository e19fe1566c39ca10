use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::metrics;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/languages", get(handlers::list_languages))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/submission/run/:problem_id", post(handlers::run_code))
        .route("/submission/submit/:problem_id", post(handlers::submit_code))
        .route("/submission/:submission_id", get(handlers::get_submission))
        .route("/problem/:problem_id/submissions", get(handlers::list_submissions))
}
