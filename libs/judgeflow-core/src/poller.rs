/// Result Poller - Bounded Wait for Terminal Status
///
/// **Core Responsibility:**
/// Re-query the engine for a token batch until every submission is terminal.
///
/// **Loop Rules:**
/// - One status query per attempt, covering the whole batch
/// - Done when every status id is above PROCESSING
/// - Between attempts, sleep per `PollPolicy::delay_after` (fixed 1.5s by default)
/// - Stop with `Timeout` after `max_attempts` queries or once the deadline
///   would be crossed; never loops forever
/// - Results are handed back in token order even if the engine reorders them
///
/// The loop is an ordinary future. Dropping it (caller timeout, aborted task,
/// disconnected client) stops further queries; nothing runs in the background.

use crate::engine::ExecutionEngine;
use crate::error::{JudgeError, JudgeResult, Stage};
use judgeflow_common::config::PollPolicy;
use judgeflow_common::types::{ExecutionResult, Token};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Terminal results plus how long it took to get them
#[derive(Debug, Clone)]
pub struct PolledBatch {
    pub results: Vec<ExecutionResult>,
    pub attempts: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct ResultPoller {
    policy: PollPolicy,
}

impl ResultPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Wait until every token is terminal and return results in token order
    pub async fn poll_until_complete<E>(
        &self,
        engine: &E,
        tokens: &[Token],
    ) -> JudgeResult<Vec<ExecutionResult>>
    where
        E: ExecutionEngine + ?Sized,
    {
        Ok(self.poll(engine, tokens).await?.results)
    }

    /// Same as `poll_until_complete`, keeping attempt count and elapsed time
    pub async fn poll<E>(&self, engine: &E, tokens: &[Token]) -> JudgeResult<PolledBatch>
    where
        E: ExecutionEngine + ?Sized,
    {
        let started = Instant::now();
        if tokens.is_empty() {
            return Ok(PolledBatch {
                results: Vec::new(),
                attempts: 0,
                elapsed: Duration::ZERO,
            });
        }

        let deadline = started + self.policy.deadline;
        let total = tokens.len();
        let mut attempts = 0u32;
        let mut pending = total;

        loop {
            attempts += 1;

            let fetched = match tokio::time::timeout_at(deadline, engine.fetch_batch(tokens)).await {
                Ok(fetched) => fetched?,
                Err(_) => {
                    return Err(self.timeout(attempts, started, pending, total, tokens));
                }
            };
            let results = align_to_tokens(tokens, fetched)?;
            pending = results.iter().filter(|r| !r.is_terminal()).count();

            debug!(
                attempt = attempts,
                pending = pending,
                total = total,
                "Polled engine batch"
            );

            if pending == 0 {
                return Ok(PolledBatch {
                    results,
                    attempts,
                    elapsed: started.elapsed(),
                });
            }

            if attempts >= self.policy.max_attempts {
                return Err(self.timeout(attempts, started, pending, total, tokens));
            }

            let delay = self.policy.delay_after(attempts);
            if Instant::now() + delay >= deadline {
                return Err(self.timeout(attempts, started, pending, total, tokens));
            }
            tokio::time::sleep(delay).await;
        }
    }

    fn timeout(
        &self,
        attempts: u32,
        started: Instant,
        pending: usize,
        total: usize,
        tokens: &[Token],
    ) -> JudgeError {
        let elapsed = started.elapsed();
        warn!(
            attempts = attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            pending = pending,
            total = total,
            first_token = %tokens[0],
            "Engine batch did not reach terminal state in time"
        );
        JudgeError::Timeout {
            attempts,
            elapsed,
            pending,
            total,
        }
    }
}

/// Put results back into token order.
///
/// The engine is expected to preserve order; when it does not, results
/// are matched by token. Any missing, extra or unknown token is an
/// engine fault.
pub fn align_to_tokens(
    tokens: &[Token],
    results: Vec<ExecutionResult>,
) -> JudgeResult<Vec<ExecutionResult>> {
    if results.len() != tokens.len() {
        return Err(JudgeError::unavailable(
            Stage::Poll,
            format!(
                "engine returned {} results for {} tokens",
                results.len(),
                tokens.len()
            ),
        ));
    }

    if results.iter().zip(tokens).all(|(r, t)| &r.token == t) {
        return Ok(results);
    }

    let mut by_token: HashMap<Token, ExecutionResult> = results
        .into_iter()
        .map(|r| (r.token.clone(), r))
        .collect();

    tokens
        .iter()
        .map(|token| {
            by_token.remove(token).ok_or_else(|| {
                JudgeError::unavailable(Stage::Poll, format!("no result for token {}", token))
            })
        })
        .collect()
}
