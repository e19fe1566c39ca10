// In-process execution engine for unit tests

use crate::engine::ExecutionEngine;
use crate::error::{JudgeError, JudgeResult, Stage};
use async_trait::async_trait;
use judgeflow_common::types::{status, ExecutionResult, SubmissionRequest, Token};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Simulated program: given a request, produce (status id, stdout)
pub(crate) type Program = Box<dyn Fn(&SubmissionRequest) -> (i32, String) + Send + Sync>;

pub(crate) fn tokens(names: &[&str]) -> Vec<Token> {
    names.iter().map(|n| Token::new(*n)).collect()
}

/// Engine that "runs" submissions with a closure.
///
/// Each token is reported as queued or processing for its first
/// `pending_rounds` status queries, then with the program's result.
/// Counts are kept per token, so concurrent batches progress independently.
pub(crate) struct MockEngine {
    pub submit_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    next_token: AtomicUsize,
    program: Program,
    pending_rounds: usize,
    submit_failure: Option<u16>,
    poll_failure_after: Option<usize>,
    fetch_delay: Option<Duration>,
    reverse: bool,
    submitted: Mutex<HashMap<Token, SubmissionRequest>>,
    fetches: Mutex<HashMap<Token, usize>>,
}

impl MockEngine {
    pub fn new<F>(program: F) -> Self
    where
        F: Fn(&SubmissionRequest) -> (i32, String) + Send + Sync + 'static,
    {
        Self {
            submit_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            next_token: AtomicUsize::new(0),
            program: Box::new(program),
            pending_rounds: 0,
            submit_failure: None,
            poll_failure_after: None,
            fetch_delay: None,
            reverse: false,
            submitted: Mutex::new(HashMap::new()),
            fetches: Mutex::new(HashMap::new()),
        }
    }

    /// Every program prints exactly the expected output
    pub fn accepting() -> Self {
        Self::new(|req| (status::ACCEPTED, format!("{}\n", req.expected_output)))
    }

    pub fn with_pending_rounds(mut self, rounds: usize) -> Self {
        self.pending_rounds = rounds;
        self
    }

    /// Batch submission answers with this HTTP status
    pub fn failing_submit(mut self, http_status: u16) -> Self {
        self.submit_failure = Some(http_status);
        self
    }

    /// Status queries after the first `ok_polls` fail
    pub fn failing_poll_after(mut self, ok_polls: usize) -> Self {
        self.poll_failure_after = Some(ok_polls);
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn reversing_results(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    /// Submit `n` trivial requests and hand back their tokens
    pub async fn submit_echo(&self, n: usize) -> Vec<Token> {
        let requests: Vec<_> = (0..n)
            .map(|i| SubmissionRequest {
                source_code: "echo".to_string(),
                language_id: 63,
                stdin: i.to_string(),
                expected_output: i.to_string(),
            })
            .collect();
        self.submit_batch(&requests).await.unwrap()
    }
}

#[async_trait]
impl ExecutionEngine for MockEngine {
    async fn submit_batch(&self, requests: &[SubmissionRequest]) -> JudgeResult<Vec<Token>> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(http_status) = self.submit_failure {
            return Err(JudgeError::EngineUnavailable {
                stage: Stage::Submit,
                status: Some(http_status),
                message: format!("HTTP {}", http_status),
            });
        }

        let mut submitted = self.submitted.lock().unwrap();
        Ok(requests
            .iter()
            .map(|req| {
                let n = self.next_token.fetch_add(1, Ordering::SeqCst);
                let token = Token::new(format!("tok-{}", n));
                submitted.insert(token.clone(), req.clone());
                token
            })
            .collect())
    }

    async fn fetch_batch(&self, tokens: &[Token]) -> JudgeResult<Vec<ExecutionResult>> {
        let call = self.poll_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ok_polls) = self.poll_failure_after {
            if call > ok_polls {
                return Err(JudgeError::EngineUnavailable {
                    stage: Stage::Poll,
                    status: Some(502),
                    message: "HTTP 502".to_string(),
                });
            }
        }

        let submitted = self.submitted.lock().unwrap().clone();
        let rounds: Vec<usize> = {
            let mut fetches = self.fetches.lock().unwrap();
            tokens
                .iter()
                .map(|token| {
                    let seen = fetches.entry(token.clone()).or_insert(0);
                    *seen += 1;
                    *seen
                })
                .collect()
        };
        let mut results: Vec<ExecutionResult> = tokens
            .iter()
            .zip(rounds)
            .map(|(token, round)| {
                let request = submitted
                    .get(token)
                    .unwrap_or_else(|| panic!("unknown token {}", token));
                if round <= self.pending_rounds {
                    let status_id = if round % 2 == 1 { status::IN_QUEUE } else { status::PROCESSING };
                    return ExecutionResult::with_status(token.clone(), status_id);
                }
                let (status_id, stdout) = (self.program)(request);
                let mut result = ExecutionResult::with_status(token.clone(), status_id);
                result.stdout = Some(stdout);
                result.time = Some(0.01);
                result.memory = Some(1024 + request.stdin.len() as u64);
                match status_id {
                    status::COMPILATION_ERROR => {
                        result.stdout = None;
                        result.compile_output = Some("main.cpp:1: error: expected ';'".to_string());
                    }
                    status::RUNTIME_ERROR_SIGSEGV..=status::RUNTIME_ERROR_OTHER => {
                        result.stderr = Some("Segmentation fault".to_string());
                    }
                    _ => {}
                }
                result
            })
            .collect();

        if self.reverse {
            results.reverse();
        }
        Ok(results)
    }
}
