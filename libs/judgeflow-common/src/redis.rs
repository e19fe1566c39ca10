use crate::types::{Problem, SubmissionRecord};
use redis::{AsyncCommands, RedisResult};
use uuid::Uuid;

/// Redis key semantics shared by the API and the CLI.
/// Problems are written by the catalogue side; submission records by the API.

pub const PROBLEM_PREFIX: &str = "judgeflow:problem";
pub const SUBMISSION_PREFIX: &str = "judgeflow:submission";

/// Submission records expire after 7 days
pub const SUBMISSION_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Per-problem submission index keeps at most this many ids
pub const SUBMISSION_INDEX_LIMIT: isize = 200;

pub fn problem_key(problem_id: &str) -> String {
    format!("{}:{}", PROBLEM_PREFIX, problem_id)
}

pub fn submission_key(submission_id: &Uuid) -> String {
    format!("{}:{}", SUBMISSION_PREFIX, submission_id)
}

/// List of submission ids for a problem, newest first
pub fn problem_submissions_key(problem_id: &str) -> String {
    format!("{}:{}:submissions", PROBLEM_PREFIX, problem_id)
}

fn encode_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string()))
}

fn decode_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "deserialization error", e.to_string()))
}

pub async fn put_problem(
    conn: &mut redis::aio::ConnectionManager,
    problem: &Problem,
) -> RedisResult<()> {
    let payload = serde_json::to_string(problem).map_err(encode_error)?;
    conn.set(problem_key(&problem.id), payload).await
}

pub async fn get_problem(
    conn: &mut redis::aio::ConnectionManager,
    problem_id: &str,
) -> RedisResult<Option<Problem>> {
    let payload: Option<String> = conn.get(problem_key(problem_id)).await?;

    match payload {
        Some(data) => Ok(Some(serde_json::from_str(&data).map_err(decode_error)?)),
        None => Ok(None),
    }
}

/// Store a judged submission and index it under its problem
pub async fn store_submission(
    conn: &mut redis::aio::ConnectionManager,
    record: &SubmissionRecord,
) -> RedisResult<()> {
    let payload = serde_json::to_string(record).map_err(encode_error)?;
    let index_key = problem_submissions_key(&record.problem_id);

    redis::pipe()
        .atomic()
        .set_ex(submission_key(&record.id), payload, SUBMISSION_TTL_SECONDS)
        .ignore()
        .lpush(&index_key, record.id.to_string())
        .ignore()
        .ltrim(&index_key, 0, SUBMISSION_INDEX_LIMIT - 1)
        .ignore()
        .query_async(conn)
        .await
}

pub async fn get_submission(
    conn: &mut redis::aio::ConnectionManager,
    submission_id: &Uuid,
) -> RedisResult<Option<SubmissionRecord>> {
    let payload: Option<String> = conn.get(submission_key(submission_id)).await?;

    match payload {
        Some(data) => Ok(Some(serde_json::from_str(&data).map_err(decode_error)?)),
        None => Ok(None),
    }
}

/// Records for a problem, newest first. Expired records are skipped.
pub async fn list_submissions(
    conn: &mut redis::aio::ConnectionManager,
    problem_id: &str,
    limit: usize,
) -> RedisResult<Vec<SubmissionRecord>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = conn
        .lrange(problem_submissions_key(problem_id), 0, limit as isize - 1)
        .await?;

    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        let Ok(uuid) = Uuid::parse_str(&id) else {
            continue;
        };
        if let Some(record) = get_submission(conn, &uuid).await? {
            records.push(record);
        }
    }
    Ok(records)
}
