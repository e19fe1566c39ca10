// HTTP route handlers for the judge API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use judgeflow_common::redis;
use judgeflow_common::types::{EvaluationScope, Problem, SubmissionRecord, Verdict};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

const DEFAULT_LIST_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: String,
}

impl EvaluateRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.code.trim().is_empty() {
            return Err(ApiError::MissingField("code"));
        }
        if self.language.trim().is_empty() {
            return Err(ApiError::MissingField("language"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub submission_id: Uuid,
    pub verdict: Verdict,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

fn list_limit(params: &ListParams) -> usize {
    params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(redis::SUBMISSION_INDEX_LIMIT as usize)
}

async fn load_problem(state: &AppState, problem_id: &str) -> Result<Problem, ApiError> {
    let mut conn = state.redis.clone();
    redis::get_problem(&mut conn, problem_id)
        .await?
        .ok_or_else(|| ApiError::ProblemNotFound(problem_id.to_string()))
}

/// POST /submission/run/:problem_id - Judge against visible cases, not stored
pub async fn run_code(
    State(state): State<Arc<AppState>>,
    Path(problem_id): Path<String>,
    Json(payload): Json<EvaluateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;
    let problem = load_problem(&state, &problem_id).await?;

    let verdict = state
        .judge
        .evaluate(&problem, &payload.code, &payload.language, EvaluationScope::Run)
        .await?;

    Ok((StatusCode::OK, Json(verdict)))
}

/// POST /submission/submit/:problem_id - Judge against all cases and store the record
pub async fn submit_code(
    State(state): State<Arc<AppState>>,
    Path(problem_id): Path<String>,
    Json(payload): Json<EvaluateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;
    let problem = load_problem(&state, &problem_id).await?;

    let verdict = state
        .judge
        .evaluate(&problem, &payload.code, &payload.language, EvaluationScope::Submit)
        .await?;

    let record = SubmissionRecord::from_verdict(&problem_id, &payload.language, &payload.code, &verdict);
    let mut conn = state.redis.clone();
    redis::store_submission(&mut conn, &record).await?;

    info!(
        submission_id = %record.id,
        problem_id = %problem_id,
        outcome = %record.outcome,
        passed = record.passed,
        total = record.total,
        "Submission stored"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            submission_id: record.id,
            verdict,
        }),
    ))
}

/// GET /submission/:submission_id - Stored submission record
pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = Uuid::parse_str(&submission_id)
        .map_err(|_| ApiError::InvalidSubmissionId(submission_id.clone()))?;

    let mut conn = state.redis.clone();
    match redis::get_submission(&mut conn, &id).await? {
        Some(record) => Ok((StatusCode::OK, Json(record))),
        None => Err(ApiError::SubmissionNotFound(submission_id)),
    }
}

/// GET /problem/:problem_id/submissions - Newest first
pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Path(problem_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = state.redis.clone();
    let records = redis::list_submissions(&mut conn, &problem_id, list_limit(&params)).await?;
    Ok((StatusCode::OK, Json(records)))
}

/// GET /languages - Supported language names and engine ids
pub async fn list_languages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.judge.languages().entries().to_vec()))
}

/// GET /health - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(code: &str, language: &str) -> EvaluateRequest {
        EvaluateRequest {
            code: code.to_string(),
            language: language.to_string(),
        }
    }

    #[test]
    fn test_blank_fields_are_rejected() {
        assert!(matches!(
            request("   ", "cpp").validate(),
            Err(ApiError::MissingField("code"))
        ));
        assert!(matches!(
            request("int main(){}", "").validate(),
            Err(ApiError::MissingField("language"))
        ));
        assert!(request("int main(){}", "cpp").validate().is_ok());
    }

    #[test]
    fn test_request_body_fields_default_to_empty() {
        let payload: EvaluateRequest = serde_json::from_str(r#"{"language":"js"}"#).unwrap();
        assert!(payload.code.is_empty());
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_list_limit_is_capped_by_index_size() {
        assert_eq!(list_limit(&ListParams { limit: None }), DEFAULT_LIST_LIMIT);
        assert_eq!(list_limit(&ListParams { limit: Some(5) }), 5);
        assert_eq!(
            list_limit(&ListParams { limit: Some(10_000) }),
            redis::SUBMISSION_INDEX_LIMIT as usize
        );
    }
}
