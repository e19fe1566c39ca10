use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Numeric language identifier understood by the execution engine
pub type LanguageId = u32;

/// Judge0 status ids. Anything above `PROCESSING` is terminal.
pub mod status {
    pub const IN_QUEUE: i32 = 1;
    pub const PROCESSING: i32 = 2;
    pub const ACCEPTED: i32 = 3;
    pub const WRONG_ANSWER: i32 = 4;
    pub const TIME_LIMIT_EXCEEDED: i32 = 5;
    pub const COMPILATION_ERROR: i32 = 6;
    pub const RUNTIME_ERROR_SIGSEGV: i32 = 7;
    pub const RUNTIME_ERROR_SIGXFSZ: i32 = 8;
    pub const RUNTIME_ERROR_SIGFPE: i32 = 9;
    pub const RUNTIME_ERROR_SIGABRT: i32 = 10;
    pub const RUNTIME_ERROR_NZEC: i32 = 11;
    pub const RUNTIME_ERROR_OTHER: i32 = 12;
    pub const INTERNAL_ERROR: i32 = 13;
    pub const EXEC_FORMAT_ERROR: i32 = 14;

    /// Whether the engine has finished with a submission
    pub fn is_terminal(status_id: i32) -> bool {
        status_id > PROCESSING
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            explanation: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// A problem as stored by the problem catalogue.
/// Only the parts the judge needs are modelled here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub visible_test_cases: Vec<TestCase>,
    #[serde(default)]
    pub hidden_test_cases: Vec<TestCase>,
}

/// Which test cases an evaluation runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationScope {
    /// Visible cases only, used while the user is iterating
    Run,
    /// Visible cases followed by hidden cases
    Submit,
}

impl fmt::Display for EvaluationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationScope::Run => write!(f, "run"),
            EvaluationScope::Submit => write!(f, "submit"),
        }
    }
}

/// One program execution request sent to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub source_code: String,
    pub language_id: LanguageId,
    pub stdin: String,
    pub expected_output: String,
}

/// Opaque tracking token handed out by the engine for one submission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse classification of an engine status id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Pending,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    CompilationError,
    RuntimeError,
    InternalError,
    Unknown,
}

impl StatusKind {
    pub fn from_id(status_id: i32) -> Self {
        match status_id {
            status::IN_QUEUE | status::PROCESSING => StatusKind::Pending,
            status::ACCEPTED => StatusKind::Accepted,
            status::WRONG_ANSWER => StatusKind::WrongAnswer,
            status::TIME_LIMIT_EXCEEDED => StatusKind::TimeLimitExceeded,
            status::COMPILATION_ERROR => StatusKind::CompilationError,
            status::RUNTIME_ERROR_SIGSEGV..=status::RUNTIME_ERROR_OTHER => StatusKind::RuntimeError,
            status::INTERNAL_ERROR | status::EXEC_FORMAT_ERROR => StatusKind::InternalError,
            _ => StatusKind::Unknown,
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusKind::Pending => "pending",
            StatusKind::Accepted => "accepted",
            StatusKind::WrongAnswer => "wrong_answer",
            StatusKind::TimeLimitExceeded => "time_limit_exceeded",
            StatusKind::CompilationError => "compilation_error",
            StatusKind::RuntimeError => "runtime_error",
            StatusKind::InternalError => "internal_error",
            StatusKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Engine-side result of one submission. Read-only to the judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub token: Token,
    pub status_id: i32,
    #[serde(default)]
    pub status_description: Option<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// CPU time in seconds
    #[serde(default)]
    pub time: Option<f64>,
    /// Peak memory in kilobytes
    #[serde(default)]
    pub memory: Option<u64>,
}

impl ExecutionResult {
    /// Bare result with only a token and a status, handy for engines and tests
    pub fn with_status(token: Token, status_id: i32) -> Self {
        Self {
            token,
            status_id,
            status_description: None,
            stdout: None,
            stderr: None,
            compile_output: None,
            message: None,
            time: None,
            memory: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        status::is_terminal(self.status_id)
    }

    pub fn kind(&self) -> StatusKind {
        StatusKind::from_id(self.status_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Pass,
    Fail,
    Error,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => write!(f, "PASS"),
            Outcome::Fail => write!(f, "FAIL"),
            Outcome::Error => write!(f, "ERROR"),
        }
    }
}

/// Judged result of a single test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseVerdict {
    pub index: usize,
    pub visibility: Visibility,
    pub status_id: i32,
    pub status: StatusKind,
    pub passed: bool,
    /// Input and expected output, only for visible cases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub memory: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: Outcome,
    pub cases: Vec<CaseVerdict>,
    pub passed: usize,
    pub total: usize,
    /// Sum of per-case CPU time in seconds
    pub runtime_secs: f64,
    /// Peak memory across cases in kilobytes
    pub memory_kb: u64,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        self.outcome == Outcome::Pass
    }

    /// Pass/fail flags in test case order
    pub fn per_test_case(&self) -> Vec<bool> {
        self.cases.iter().map(|c| c.passed).collect()
    }

    pub fn failed_cases(&self) -> Vec<usize> {
        self.cases
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.index)
            .collect()
    }
}

/// Persisted summary of a judged submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub problem_id: String,
    pub language: String,
    pub code: String,
    pub outcome: Outcome,
    pub passed: usize,
    pub total: usize,
    pub runtime_secs: f64,
    pub memory_kb: u64,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SubmissionRecord {
    pub fn from_verdict(problem_id: &str, language: &str, code: &str, verdict: &Verdict) -> Self {
        Self {
            id: Uuid::new_v4(),
            problem_id: problem_id.to_string(),
            language: language.to_string(),
            code: code.to_string(),
            outcome: verdict.outcome,
            passed: verdict.passed,
            total: verdict.total,
            runtime_secs: verdict.runtime_secs,
            memory_kb: verdict.memory_kb,
            error_message: verdict.error_message.clone(),
            created_at: Utc::now(),
        }
    }
}
