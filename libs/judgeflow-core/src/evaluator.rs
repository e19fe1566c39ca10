/// Verdict Aggregator - Submission Evaluation Orchestration
///
/// **Core Responsibility:**
/// Turn (problem test cases, user code, language name) into one Verdict.
///
/// **Pipeline:**
/// 1. Resolve the language; unknown names fail before any network call
/// 2. Build one request per test case: visible cases in authoring order,
///    then hidden cases in authoring order (`Submit` scope only)
/// 3. Submit the batch in a single call
/// 4. Poll until every result is terminal (bounded, see `poller`)
/// 5. Judge each case: status must be ACCEPTED and normalized stdout must
///    equal normalized expected output
/// 6. Aggregate: PASS iff every case passed
///
/// **Normalization Rules:**
/// - `\r\n` treated as `\n`
/// - Leading and trailing whitespace trimmed
/// - Internal whitespace and case preserved
///
/// **Hidden Cases:**
/// Stdin, expected output, stdout and runtime diagnostics are withheld.
/// Only compiler output is reported.
///
/// Either a complete Verdict comes back or an error does; never both.

use crate::engine::ExecutionEngine;
use crate::error::{JudgeError, JudgeResult, Stage};
use crate::language::LanguageTable;
use crate::poller::ResultPoller;
use judgeflow_common::config::PollPolicy;
use judgeflow_common::types::{
    CaseVerdict, EvaluationScope, ExecutionResult, LanguageId, Outcome, Problem, StatusKind,
    SubmissionRequest, TestCase, Verdict, Visibility,
};
use tracing::{debug, info, instrument};

/// A test case in its position within the batch
#[derive(Debug, Clone, Copy)]
pub struct PlannedCase<'a> {
    pub visibility: Visibility,
    pub case: &'a TestCase,
}

/// Fix the batch order for a problem: visible first, then hidden
pub fn plan_cases(problem: &Problem, scope: EvaluationScope) -> Vec<PlannedCase<'_>> {
    let visible = problem.visible_test_cases.iter().map(|case| PlannedCase {
        visibility: Visibility::Visible,
        case,
    });
    let hidden = problem.hidden_test_cases.iter().map(|case| PlannedCase {
        visibility: Visibility::Hidden,
        case,
    });

    match scope {
        EvaluationScope::Run => visible.collect(),
        EvaluationScope::Submit => visible.chain(hidden).collect(),
    }
}

pub fn build_requests(
    plan: &[PlannedCase<'_>],
    source_code: &str,
    language_id: LanguageId,
) -> Vec<SubmissionRequest> {
    plan.iter()
        .map(|planned| SubmissionRequest {
            source_code: source_code.to_string(),
            language_id,
            stdin: planned.case.input.clone(),
            expected_output: planned.case.expected_output.clone(),
        })
        .collect()
}

fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim().to_string()
}

fn non_empty(text: &Option<String>) -> Option<String> {
    text.as_ref()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Judge one case against its terminal engine result
pub fn judge_case(index: usize, planned: &PlannedCase<'_>, result: &ExecutionResult) -> CaseVerdict {
    let kind = result.kind();
    let passed = kind == StatusKind::Accepted
        && normalize_output(result.stdout.as_deref().unwrap_or(""))
            == normalize_output(&planned.case.expected_output);

    // Hidden cases only report what cannot depend on their input
    let (input, expected_output, stdout, error) = match planned.visibility {
        Visibility::Visible => (
            Some(planned.case.input.clone()),
            Some(planned.case.expected_output.clone()),
            result.stdout.clone(),
            non_empty(&result.compile_output)
                .or_else(|| non_empty(&result.stderr))
                .or_else(|| non_empty(&result.message)),
        ),
        Visibility::Hidden => {
            let error = match kind {
                StatusKind::CompilationError => non_empty(&result.compile_output),
                _ => None,
            };
            (None, None, None, error)
        }
    };

    CaseVerdict {
        index,
        visibility: planned.visibility,
        status_id: result.status_id,
        status: kind,
        passed,
        input,
        expected_output,
        stdout,
        error,
        time: result.time,
        memory: result.memory,
    }
}

/// Whether a failing case means the program could not be judged on its output
fn is_error_kind(kind: StatusKind) -> bool {
    matches!(
        kind,
        StatusKind::CompilationError
            | StatusKind::RuntimeError
            | StatusKind::InternalError
            | StatusKind::Unknown
    )
}

/// Fold per-case verdicts into the overall verdict
pub fn aggregate(cases: Vec<CaseVerdict>) -> Verdict {
    let total = cases.len();
    let passed = cases.iter().filter(|c| c.passed).count();
    let runtime_secs: f64 = cases.iter().filter_map(|c| c.time).sum();
    let memory_kb = cases.iter().filter_map(|c| c.memory).max().unwrap_or(0);

    let outcome = if passed == total {
        Outcome::Pass
    } else if cases.iter().any(|c| !c.passed && is_error_kind(c.status)) {
        Outcome::Error
    } else {
        Outcome::Fail
    };

    let error_message = cases
        .iter()
        .filter(|c| !c.passed)
        .find_map(|c| c.error.clone());

    Verdict {
        outcome,
        cases,
        passed,
        total,
        runtime_secs,
        memory_kb,
        error_message,
    }
}

/// Evaluates user code against a problem through an execution engine.
///
/// Holds no per-evaluation state, so one `Judge` can serve many concurrent
/// evaluations; each call runs its own submit and poll sequence.
#[derive(Debug, Clone)]
pub struct Judge<E> {
    engine: E,
    languages: LanguageTable,
    poller: ResultPoller,
}

impl<E: ExecutionEngine> Judge<E> {
    pub fn new(engine: E, policy: PollPolicy) -> Self {
        Self {
            engine,
            languages: LanguageTable::builtin(),
            poller: ResultPoller::new(policy),
        }
    }

    pub fn with_languages(mut self, languages: LanguageTable) -> Self {
        self.languages = languages;
        self
    }

    pub fn languages(&self) -> &LanguageTable {
        &self.languages
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Evaluate and return the verdict together with the number of status queries made
    #[instrument(skip(self, problem, source_code), fields(problem_id = %problem.id, scope = %scope))]
    pub async fn evaluate_with_attempts(
        &self,
        problem: &Problem,
        source_code: &str,
        language: &str,
        scope: EvaluationScope,
    ) -> JudgeResult<(Verdict, u32)> {
        let language_id = self
            .languages
            .resolve(language)
            .ok_or_else(|| JudgeError::UnsupportedLanguage(language.to_string()))?;

        let plan = plan_cases(problem, scope);
        if plan.is_empty() {
            return Err(JudgeError::NoTestCases(scope));
        }

        let requests = build_requests(&plan, source_code, language_id);
        let tokens = self.engine.submit_batch(&requests).await?;
        if tokens.len() != requests.len() {
            return Err(JudgeError::EngineUnavailable {
                stage: Stage::Submit,
                status: None,
                message: format!(
                    "engine returned {} tokens for {} submissions",
                    tokens.len(),
                    requests.len()
                ),
            });
        }
        debug!(language_id = language_id, batch_size = tokens.len(), "Batch accepted by engine");

        let polled = self.poller.poll(&self.engine, &tokens).await?;

        let cases = plan
            .iter()
            .zip(&polled.results)
            .enumerate()
            .map(|(index, (planned, result))| judge_case(index, planned, result))
            .collect();
        let verdict = aggregate(cases);

        info!(
            language = %language,
            outcome = %verdict.outcome,
            passed = verdict.passed,
            total = verdict.total,
            poll_attempts = polled.attempts,
            elapsed_ms = polled.elapsed.as_millis() as u64,
            failed_cases = ?verdict.failed_cases(),
            "Evaluation complete"
        );

        Ok((verdict, polled.attempts))
    }

    pub async fn evaluate(
        &self,
        problem: &Problem,
        source_code: &str,
        language: &str,
        scope: EvaluationScope,
    ) -> JudgeResult<Verdict> {
        Ok(self
            .evaluate_with_attempts(problem, source_code, language, scope)
            .await?
            .0)
    }
}
