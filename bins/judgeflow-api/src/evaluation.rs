// Evaluations bounded by a shared concurrency limit and an outer timeout

use judgeflow_common::types::{EvaluationScope, Problem, Verdict};
use judgeflow_core::{ExecutionEngine, Judge, LanguageTable};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::warn;

use crate::error::ApiError;
use crate::metrics;

/// A `Judge` that at most `max_concurrent` requests can use at once.
///
/// Dropping an `evaluate` future (client disconnect) releases its permit
/// and stops the poll loop.
pub struct BoundedJudge<E> {
    judge: Judge<E>,
    permits: Semaphore,
    timeout: Duration,
}

impl<E: ExecutionEngine> BoundedJudge<E> {
    pub fn new(judge: Judge<E>, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            judge,
            permits: Semaphore::new(max_concurrent),
            timeout,
        }
    }

    pub fn languages(&self) -> &LanguageTable {
        self.judge.languages()
    }

    pub async fn evaluate(
        &self,
        problem: &Problem,
        code: &str,
        language: &str,
        scope: EvaluationScope,
    ) -> Result<Verdict, ApiError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ApiError::ShuttingDown)?;
        let _in_flight = metrics::InFlight::start();
        let started = Instant::now();

        let evaluation = self
            .judge
            .evaluate_with_attempts(problem, code, language, scope);

        match tokio::time::timeout(self.timeout, evaluation).await {
            Ok(Ok((verdict, attempts))) => {
                metrics::record_evaluation(scope, verdict.outcome, attempts, started.elapsed());
                Ok(verdict)
            }
            Ok(Err(e)) => {
                warn!(
                    problem_id = %problem.id,
                    scope = %scope,
                    code = e.code(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "Evaluation failed"
                );
                metrics::record_error(e.code());
                Err(e.into())
            }
            Err(_) => {
                warn!(
                    problem_id = %problem.id,
                    scope = %scope,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Evaluation exceeded outer timeout"
                );
                metrics::record_error("evaluation_timeout");
                Err(ApiError::EvaluationTimeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use judgeflow_common::config::PollPolicy;
    use judgeflow_common::types::{status, ExecutionResult, Outcome, SubmissionRequest, TestCase, Token};
    use judgeflow_core::JudgeResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Every status query takes `delay` and reports ACCEPTED with stdout "ok"
    struct SlowEngine {
        delay: Duration,
        next_token: AtomicUsize,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowEngine {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                next_token: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ExecutionEngine for SlowEngine {
        async fn submit_batch(&self, requests: &[SubmissionRequest]) -> JudgeResult<Vec<Token>> {
            Ok(requests
                .iter()
                .map(|_| Token::new(format!("t{}", self.next_token.fetch_add(1, Ordering::SeqCst))))
                .collect())
        }

        async fn fetch_batch(&self, tokens: &[Token]) -> JudgeResult<Vec<ExecutionResult>> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            Ok(tokens
                .iter()
                .map(|token| {
                    let mut result = ExecutionResult::with_status(token.clone(), status::ACCEPTED);
                    result.stdout = Some("ok\n".to_string());
                    result
                })
                .collect())
        }
    }

    fn problem() -> Problem {
        Problem {
            id: "echo-ok".to_string(),
            title: "Print ok".to_string(),
            visible_test_cases: vec![TestCase::new("", "ok")],
            hidden_test_cases: vec![],
        }
    }

    fn bounded(engine: Arc<SlowEngine>, max_concurrent: usize, timeout: Duration) -> BoundedJudge<Arc<SlowEngine>> {
        BoundedJudge::new(Judge::new(engine, PollPolicy::default()), max_concurrent, timeout)
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_evaluation_hits_outer_timeout() {
        let engine = Arc::new(SlowEngine::new(Duration::from_secs(30)));
        let judge = bounded(Arc::clone(&engine), 4, Duration::from_secs(2));

        let started = Instant::now();
        let err = judge
            .evaluate(&problem(), "print('ok')", "js", EvaluationScope::Run)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::EvaluationTimeout(t) if t == Duration::from_secs(2)));
        assert_eq!(err.code(), "evaluation_timeout");
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(engine.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_releases_permit() {
        let engine = Arc::new(SlowEngine::new(Duration::from_secs(30)));
        let judge = bounded(engine, 1, Duration::from_secs(1));

        for _ in 0..2 {
            let err = judge
                .evaluate(&problem(), "code", "js", EvaluationScope::Run)
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::EvaluationTimeout(_)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_evaluations_are_capped() {
        let engine = Arc::new(SlowEngine::new(Duration::from_secs(1)));
        let judge = Arc::new(bounded(Arc::clone(&engine), 2, Duration::from_secs(60)));

        let started = Instant::now();
        let handles: Vec<_> = (0..5)
            .map(|_| {
                let judge = Arc::clone(&judge);
                tokio::spawn(async move {
                    judge
                        .evaluate(&problem(), "code", "js", EvaluationScope::Run)
                        .await
                })
            })
            .collect();

        for handle in handles {
            let verdict = handle.await.unwrap().unwrap();
            assert_eq!(verdict.outcome, Outcome::Pass);
        }

        assert_eq!(engine.peak.load(Ordering::SeqCst), 2);
        // five one-second evaluations, two at a time
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_engine_errors_pass_through() {
        let judge = bounded(Arc::new(SlowEngine::new(Duration::ZERO)), 1, Duration::from_secs(5));

        let err = judge
            .evaluate(&problem(), "code", "python3", EvaluationScope::Run)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "unsupported_language");
    }
}
