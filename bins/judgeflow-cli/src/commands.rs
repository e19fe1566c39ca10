// CLI commands for judgeflow
use anyhow::{bail, Context, Result};
use judgeflow_common::config::{EngineConfig, PollPolicy, DEFAULT_REDIS_URL};
use judgeflow_common::redis;
use judgeflow_common::types::{CaseVerdict, EvaluationScope, Problem, Verdict, Visibility};
use judgeflow_core::{Judge, Judge0Client, LanguageTable};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Explicit path, then JUDGEFLOW_LANGUAGES, then the built-in table
fn load_table(path: Option<&Path>) -> Result<LanguageTable> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("JUDGEFLOW_LANGUAGES").map(PathBuf::from));

    match path {
        Some(path) => LanguageTable::load_from_file(&path)
            .with_context(|| format!("Failed to load language table {}", path.display())),
        None => Ok(LanguageTable::builtin()),
    }
}

/// List the language table
pub fn list_languages(table: Option<&Path>) -> Result<()> {
    let table = load_table(table)?;

    println!("📋 Supported Languages:\n");
    println!("{:<14} {:<6} {:<30}", "NAME", "ID", "ALIASES");
    println!("{}", "─".repeat(50));
    for entry in table.entries() {
        println!("{:<14} {:<6} {:<30}", entry.name, entry.id, entry.aliases.join(", "));
    }
    println!("\n✅ Total: {} language(s)", table.entries().len());
    Ok(())
}

pub fn resolve_language(name: &str, table: Option<&Path>) -> Result<()> {
    let table = load_table(table)?;
    match table.resolve(name) {
        Some(id) => {
            println!("✅ {} → {}", name.trim(), id);
            Ok(())
        }
        None => bail!("Language '{}' is not supported", name),
    }
}

/// A problem must be addressable in Redis and judgeable in both scopes
fn validate_problem(problem: &Problem) -> Result<()> {
    let id = problem.id.trim();
    if id.is_empty() {
        bail!("Problem id cannot be empty");
    }
    if id.contains(':') || id.chars().any(char::is_whitespace) {
        bail!("Problem id '{}' must not contain ':' or whitespace", problem.id);
    }
    if problem.visible_test_cases.is_empty() {
        bail!("Problem '{}' needs at least one visible test case", problem.id);
    }
    if problem.hidden_test_cases.is_empty() {
        bail!("Problem '{}' needs at least one hidden test case", problem.id);
    }
    Ok(())
}

fn read_problem(path: &Path) -> Result<Problem> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let problem: Problem = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse problem file {}", path.display()))?;
    validate_problem(&problem)?;
    Ok(problem)
}

/// Validate a problem file and store it
pub async fn load_problem(file: &Path, redis_url: Option<&str>) -> Result<()> {
    let problem = read_problem(file)?;
    println!(
        "📝 Loaded '{}' ({} visible, {} hidden test cases)",
        problem.id,
        problem.visible_test_cases.len(),
        problem.hidden_test_cases.len()
    );

    let redis_url = redis_url
        .map(str::to_string)
        .or_else(|| std::env::var("REDIS_URL").ok())
        .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());

    let client = ::redis::Client::open(redis_url.as_str()).context("Failed to create Redis client")?;
    let mut conn = ::redis::aio::ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;

    redis::put_problem(&mut conn, &problem)
        .await
        .context("Failed to store problem")?;

    println!("✅ Stored under {}", redis::problem_key(&problem.id));
    Ok(())
}

fn format_case(case: &CaseVerdict) -> String {
    let visibility = match case.visibility {
        Visibility::Visible => "visible",
        Visibility::Hidden => "hidden",
    };
    let mark = if case.passed { "✅" } else { "❌" };
    let time = case.time.map(|t| format!("{:.3}s", t)).unwrap_or_else(|| "-".to_string());
    let memory = case.memory.map(|m| format!("{} KB", m)).unwrap_or_else(|| "-".to_string());
    format!(
        "{} #{:<3} {:<8} {:<22} {:>8} {:>10}",
        mark,
        case.index,
        visibility,
        case.status.to_string(),
        time,
        memory
    )
}

fn print_verdict(verdict: &Verdict) {
    println!();
    for case in &verdict.cases {
        println!("  {}", format_case(case));
        if !case.passed && case.visibility == Visibility::Visible {
            if let Some(expected) = &case.expected_output {
                println!("       expected: {}", expected.trim());
            }
            println!("       got:      {}", case.stdout.as_deref().unwrap_or("").trim());
        }
    }
    if let Some(message) = &verdict.error_message {
        println!("\n⚠️  {}", message.lines().next().unwrap_or(""));
    }
    println!(
        "\n📊 {}: {}/{} passed, {:.3}s total, {} KB peak",
        verdict.outcome, verdict.passed, verdict.total, verdict.runtime_secs, verdict.memory_kb
    );
}

fn engine_client() -> Result<Judge0Client> {
    let config = EngineConfig::from_env()
        .context("Invalid engine configuration (JUDGE0_URL, JUDGE0_API_KEY or JUDGE0_API_KEY_FILE)")?;
    Judge0Client::new(config).context("Failed to build engine HTTP client")
}

/// Judge a local source file and exit non-zero unless it passes
pub async fn judge(problem: &Path, source: &Path, language: &str, run_only: bool) -> Result<()> {
    let problem = read_problem(problem)?;
    let code = fs::read_to_string(source)
        .with_context(|| format!("Failed to read {}", source.display()))?;
    let scope = if run_only {
        EvaluationScope::Run
    } else {
        EvaluationScope::Submit
    };

    let policy = PollPolicy::from_env().context("Invalid poll configuration")?;
    let judge = Judge::new(engine_client()?, policy).with_languages(load_table(None)?);

    println!("⚖️  Judging {} as {} ({})...", source.display(), language, scope);

    let verdict = judge
        .evaluate(&problem, &code, language, scope)
        .await
        .with_context(|| format!("Evaluation of '{}' failed", problem.id))?;

    print_verdict(&verdict);

    if !verdict.is_pass() {
        bail!("Verdict: {}", verdict.outcome);
    }
    Ok(())
}

/// Query the engine's language list and cross-check the resolver table
pub async fn ping() -> Result<()> {
    let client = engine_client()?;
    println!("📡 Contacting {}...", client.config().base_url);

    let engine_languages = client
        .list_languages()
        .await
        .context("Engine check failed")?;
    println!("✅ Engine reachable, {} language(s) available", engine_languages.len());

    let available: HashSet<u32> = engine_languages.iter().map(|l| l.id).collect();
    let table = load_table(None)?;
    let mut missing = 0;
    for entry in table.entries() {
        if !available.contains(&entry.id) {
            println!("⚠️  '{}' maps to id {} which the engine does not offer", entry.name, entry.id);
            missing += 1;
        }
    }
    if missing == 0 {
        println!("✅ Every configured language is offered by the engine");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use judgeflow_common::types::{StatusKind, TestCase};

    fn problem(id: &str, visible: usize, hidden: usize) -> Problem {
        Problem {
            id: id.to_string(),
            title: "Sum".to_string(),
            visible_test_cases: (0..visible).map(|i| TestCase::new(i.to_string(), i.to_string())).collect(),
            hidden_test_cases: (0..hidden).map(|i| TestCase::new(i.to_string(), i.to_string())).collect(),
        }
    }

    #[test]
    fn test_validate_problem_requires_both_case_sets() {
        assert!(validate_problem(&problem("sum", 1, 1)).is_ok());
        assert!(validate_problem(&problem("sum", 0, 1)).is_err());
        assert!(validate_problem(&problem("sum", 1, 0)).is_err());
    }

    #[test]
    fn test_validate_problem_rejects_bad_ids() {
        assert!(validate_problem(&problem("", 1, 1)).is_err());
        assert!(validate_problem(&problem("a:b", 1, 1)).is_err());
        assert!(validate_problem(&problem("two sum", 1, 1)).is_err());
    }

    #[test]
    fn test_read_problem_from_file() {
        let path = std::env::temp_dir().join(format!("problem-{}.json", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            r#"{
                "id": "add",
                "title": "Add two numbers",
                "visible_test_cases": [{"input": "1 2", "expected_output": "3"}],
                "hidden_test_cases": [{"input": "5 5", "expected_output": "10", "explanation": "5+5"}]
            }"#,
        )
        .unwrap();

        let loaded = read_problem(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(loaded.id, "add");
        assert_eq!(loaded.hidden_test_cases[0].expected_output, "10");
    }

    #[test]
    fn test_demo_problem_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/add-two-numbers.json");
        let loaded = read_problem(&path).unwrap();
        assert_eq!(loaded.visible_test_cases.len(), 2);
        assert_eq!(loaded.hidden_test_cases.len(), 2);
    }

    #[test]
    fn test_read_problem_reports_parse_errors() {
        let path = std::env::temp_dir().join(format!("problem-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, "{ not json").unwrap();

        let err = read_problem(&path).unwrap_err();
        fs::remove_file(&path).unwrap();

        assert!(format!("{:#}", err).contains("Failed to parse problem file"));
    }

    #[test]
    fn test_format_case_marks_failures() {
        let case = CaseVerdict {
            index: 2,
            visibility: Visibility::Hidden,
            status_id: 4,
            status: StatusKind::WrongAnswer,
            passed: false,
            input: None,
            expected_output: None,
            stdout: Some("7".to_string()),
            error: None,
            time: Some(0.012),
            memory: Some(2048),
        };
        let line = format_case(&case);
        assert!(line.starts_with("❌ #2"));
        assert!(line.contains("hidden"));
        assert!(line.contains("0.012s"));
        assert!(line.contains("2048 KB"));
    }

    #[test]
    fn test_explicit_table_path_must_exist() {
        let missing = std::env::temp_dir().join(format!("langs-{}.json", uuid::Uuid::new_v4()));
        assert!(load_table(Some(&missing)).is_err());
    }
}
