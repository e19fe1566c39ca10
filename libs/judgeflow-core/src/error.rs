use judgeflow_common::types::EvaluationScope;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub type JudgeResult<T> = Result<T, JudgeError>;

/// Which engine round trip failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Submit,
    Poll,
    Ping,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Submit => write!(f, "submit"),
            Stage::Poll => write!(f, "poll"),
            Stage::Ping => write!(f, "ping"),
        }
    }
}

/// Reasons an evaluation could not produce a verdict.
///
/// Wrong answers, crashes and compile errors are not errors here;
/// they end up inside the verdict.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("problem has no test cases for a {0} evaluation")]
    NoTestCases(EvaluationScope),

    #[error("execution engine unavailable during {stage}: {message}")]
    EngineUnavailable {
        stage: Stage,
        status: Option<u16>,
        message: String,
    },

    #[error("execution engine rejected credentials during {stage}{}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Unauthorized { stage: Stage, status: Option<u16> },

    #[error("gave up on {pending} of {total} submissions after {attempts} polls ({elapsed:?})")]
    Timeout {
        attempts: u32,
        elapsed: Duration,
        pending: usize,
        total: usize,
    },
}

impl JudgeError {
    pub(crate) fn unavailable(stage: Stage, message: impl Into<String>) -> Self {
        JudgeError::EngineUnavailable {
            stage,
            status: None,
            message: message.into(),
        }
    }

    /// Stable machine-readable code for API responses and metrics
    pub fn code(&self) -> &'static str {
        match self {
            JudgeError::UnsupportedLanguage(_) => "unsupported_language",
            JudgeError::NoTestCases(_) => "no_test_cases",
            JudgeError::EngineUnavailable { .. } => "engine_unavailable",
            JudgeError::Unauthorized { .. } => "engine_unauthorized",
            JudgeError::Timeout { .. } => "timeout",
        }
    }

    /// Caller input problems are never worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JudgeError::EngineUnavailable { .. } | JudgeError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            JudgeError::UnsupportedLanguage("python3".into()),
            JudgeError::NoTestCases(EvaluationScope::Run),
            JudgeError::unavailable(Stage::Submit, "boom"),
            JudgeError::Unauthorized { stage: Stage::Poll, status: Some(401) },
            JudgeError::Timeout {
                attempts: 3,
                elapsed: Duration::from_secs(4),
                pending: 1,
                total: 2,
            },
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(!JudgeError::UnsupportedLanguage("x".into()).is_retryable());
        assert!(!JudgeError::Unauthorized { stage: Stage::Submit, status: Some(403) }.is_retryable());
        assert!(JudgeError::unavailable(Stage::Poll, "reset").is_retryable());
    }

    #[test]
    fn test_display_includes_stage_and_status() {
        let err = JudgeError::Unauthorized { stage: Stage::Submit, status: Some(401) };
        assert_eq!(
            err.to_string(),
            "execution engine rejected credentials during submit (HTTP 401)"
        );
        let err = JudgeError::Unauthorized { stage: Stage::Poll, status: None };
        assert_eq!(err.to_string(), "execution engine rejected credentials during poll");
    }
}
