// API error type and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use judgeflow_core::JudgeError;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Judge(#[from] JudgeError),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("problem {0} not found")]
    ProblemNotFound(String),

    #[error("invalid submission id: {0}")]
    InvalidSubmissionId(String),

    #[error("submission {0} not found")]
    SubmissionNotFound(String),

    #[error("evaluation did not finish within {0:?}")]
    EvaluationTimeout(Duration),

    #[error("storage error: {0}")]
    Storage(#[from] redis::RedisError),

    #[error("server is shutting down")]
    ShuttingDown,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Judge(e) => match e {
                JudgeError::UnsupportedLanguage(_) | JudgeError::NoTestCases(_) => {
                    StatusCode::BAD_REQUEST
                }
                JudgeError::Unauthorized { .. } => StatusCode::BAD_GATEWAY,
                JudgeError::EngineUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                JudgeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            },
            ApiError::MissingField(_) | ApiError::InvalidSubmissionId(_) => StatusCode::BAD_REQUEST,
            ApiError::ProblemNotFound(_) | ApiError::SubmissionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::EvaluationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Judge(e) => e.code(),
            ApiError::MissingField(_) => "missing_field",
            ApiError::ProblemNotFound(_) => "problem_not_found",
            ApiError::InvalidSubmissionId(_) => "invalid_submission_id",
            ApiError::SubmissionNotFound(_) => "submission_not_found",
            ApiError::EvaluationTimeout(_) => "evaluation_timeout",
            ApiError::Storage(_) => "storage_error",
            ApiError::ShuttingDown => "shutting_down",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        }

        // Storage details stay in the logs
        let message = match &self {
            ApiError::Storage(_) => "failed to access submission store".to_string(),
            other => other.to_string(),
        };

        (
            status,
            Json(serde_json::json!({
                "error": self.code(),
                "message": message,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use judgeflow_common::types::EvaluationScope;
    use judgeflow_core::Stage;

    #[test]
    fn test_input_errors_are_bad_requests() {
        let unsupported = ApiError::from(JudgeError::UnsupportedLanguage("python3".into()));
        assert_eq!(unsupported.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(unsupported.code(), "unsupported_language");

        let empty = ApiError::from(JudgeError::NoTestCases(EvaluationScope::Run));
        assert_eq!(empty.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::MissingField("code").status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_engine_errors_map_to_gateway_statuses() {
        let unauthorized = ApiError::from(JudgeError::Unauthorized {
            stage: Stage::Submit,
            status: Some(401),
        });
        assert_eq!(unauthorized.status_code(), StatusCode::BAD_GATEWAY);

        let unavailable = ApiError::from(JudgeError::EngineUnavailable {
            stage: Stage::Poll,
            status: Some(503),
            message: "HTTP 503".into(),
        });
        assert_eq!(unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let timeout = ApiError::from(JudgeError::Timeout {
            attempts: 40,
            elapsed: Duration::from_secs(60),
            pending: 1,
            total: 3,
        });
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ApiError::EvaluationTimeout(Duration::from_secs(120)).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_not_found_variants() {
        assert_eq!(ApiError::ProblemNotFound("p".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::SubmissionNotFound("s".into()).status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_response_carries_code_and_status() {
        let response = ApiError::ProblemNotFound("two-sum".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
