/// Execution Engine - Remote Code Execution Boundary
///
/// **Core Responsibility:**
/// Ship submission batches to the remote engine and read back their status.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to talk to the remote service (HTTP, auth, encoding)
/// - Engine does NOT loop or wait; polling is the poller's job
/// - Engine does NOT judge correctness; that is the evaluator's job
///
/// `Judge0Client` is the production implementation. Tests plug in
/// in-process engines through the `ExecutionEngine` trait.

use crate::error::{JudgeError, JudgeResult, Stage};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use judgeflow_common::config::EngineConfig;
use judgeflow_common::types::{ExecutionResult, SubmissionRequest, Token};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, warn};

/// Longest slice of an error body carried into error messages
const MAX_ERROR_BODY_CHARS: usize = 200;

#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Submit the whole batch in one call. Tokens come back in request order.
    async fn submit_batch(&self, requests: &[SubmissionRequest]) -> JudgeResult<Vec<Token>>;

    /// Query the current state of every token in one call
    async fn fetch_batch(&self, tokens: &[Token]) -> JudgeResult<Vec<ExecutionResult>>;
}

#[async_trait]
impl<E: ExecutionEngine + ?Sized> ExecutionEngine for Arc<E> {
    async fn submit_batch(&self, requests: &[SubmissionRequest]) -> JudgeResult<Vec<Token>> {
        (**self).submit_batch(requests).await
    }

    async fn fetch_batch(&self, tokens: &[Token]) -> JudgeResult<Vec<ExecutionResult>> {
        (**self).fetch_batch(tokens).await
    }
}

#[derive(Serialize)]
struct WireSubmission<'a> {
    source_code: Cow<'a, str>,
    language_id: u32,
    stdin: Cow<'a, str>,
    expected_output: Cow<'a, str>,
}

#[derive(Serialize)]
struct BatchSubmitBody<'a> {
    submissions: Vec<WireSubmission<'a>>,
}

/// One element of the batch-create response. Judge0 reports per-item
/// validation failures in place of the token.
#[derive(Deserialize)]
struct WireToken {
    token: Option<String>,
    #[serde(flatten)]
    errors: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct WireStatus {
    id: i32,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct WireResult {
    token: Option<String>,
    #[serde(default)]
    status_id: Option<i32>,
    #[serde(default)]
    status: Option<WireStatus>,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    compile_output: Option<String>,
    #[serde(default)]
    message: Option<String>,
    /// Judge0 sends time as a decimal string
    #[serde(default)]
    time: Option<serde_json::Value>,
    #[serde(default)]
    memory: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct BatchStatusBody {
    submissions: Vec<Option<WireResult>>,
}

/// Language as listed by the engine itself
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineLanguage {
    pub id: u32,
    pub name: String,
}

fn lenient_f64(value: Option<serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_u64(value: Option<serde_json::Value>) -> Option<u64> {
    match value? {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}...", cut)
    }
}

/// HTTP client for the Judge0 batch API
#[derive(Debug, Clone)]
pub struct Judge0Client {
    http: Client,
    config: EngineConfig,
}

impl Judge0Client {
    pub fn new(config: EngineConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn batch_url(&self) -> String {
        format!("{}/submissions/batch", self.config.base_url)
    }

    fn base64_flag(&self) -> &'static str {
        if self.config.base64_encoded {
            "true"
        } else {
            "false"
        }
    }

    /// Build auth headers from the current key; the key source is consulted
    /// on every request so rotation does not need a restart
    fn auth_headers(&self, stage: Stage) -> JudgeResult<HeaderMap> {
        let key = self.config.api_key.current().map_err(|e| {
            warn!(stage = %stage, error = %e, "Engine API key unavailable");
            JudgeError::Unauthorized { stage, status: None }
        })?;

        let mut headers = HeaderMap::new();
        let name = HeaderName::from_bytes(self.config.api_key_header.as_bytes())
            .map_err(|e| JudgeError::unavailable(stage, format!("invalid API key header name: {}", e)))?;
        let value = HeaderValue::from_str(&key)
            .map_err(|_| JudgeError::Unauthorized { stage, status: None })?;
        headers.insert(name, value);

        if let Some(host) = &self.config.api_host {
            let value = HeaderValue::from_str(host)
                .map_err(|e| JudgeError::unavailable(stage, format!("invalid API host: {}", e)))?;
            headers.insert(HeaderName::from_static("x-rapidapi-host"), value);
        }
        Ok(headers)
    }

    fn encode<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if self.config.base64_encoded {
            Cow::Owned(general_purpose::STANDARD.encode(text))
        } else {
            Cow::Borrowed(text)
        }
    }

    fn decode(&self, stage: Stage, text: Option<String>) -> JudgeResult<Option<String>> {
        match text {
            Some(encoded) if self.config.base64_encoded => {
                // Judge0 wraps encoded output every 60 characters
                let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
                let bytes = general_purpose::STANDARD
                    .decode(compact)
                    .map_err(|e| JudgeError::unavailable(stage, format!("invalid base64 in result: {}", e)))?;
                Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
            }
            other => Ok(other),
        }
    }

    /// Map non-success responses onto the error taxonomy
    async fn check_status(stage: Stage, response: Response) -> JudgeResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(JudgeError::Unauthorized {
                stage,
                status: Some(status.as_u16()),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(JudgeError::EngineUnavailable {
            stage,
            status: Some(status.as_u16()),
            message: format!("HTTP {}: {}", status, truncate(&body)),
        })
    }

    fn transport_error(stage: Stage, e: reqwest::Error) -> JudgeError {
        let message = if e.is_timeout() {
            format!("request timed out: {}", e)
        } else if e.is_decode() {
            format!("undecodable response: {}", e)
        } else {
            format!("transport failure: {}", e)
        };
        JudgeError::EngineUnavailable {
            stage,
            status: e.status().map(|s| s.as_u16()),
            message,
        }
    }

    fn to_execution_result(&self, wire: WireResult) -> JudgeResult<ExecutionResult> {
        let stage = Stage::Poll;
        let token = wire
            .token
            .ok_or_else(|| JudgeError::unavailable(stage, "result without token"))?;
        let status_id = wire
            .status_id
            .or_else(|| wire.status.as_ref().map(|s| s.id))
            .ok_or_else(|| JudgeError::unavailable(stage, format!("result {} has no status", token)))?;

        Ok(ExecutionResult {
            token: Token::new(token),
            status_id,
            status_description: wire.status.and_then(|s| s.description),
            stdout: self.decode(stage, wire.stdout)?,
            stderr: self.decode(stage, wire.stderr)?,
            compile_output: self.decode(stage, wire.compile_output)?,
            message: self.decode(stage, wire.message)?,
            time: lenient_f64(wire.time),
            memory: lenient_u64(wire.memory),
        })
    }

    /// Reachability and credential check against the engine's language list
    pub async fn list_languages(&self) -> JudgeResult<Vec<EngineLanguage>> {
        let stage = Stage::Ping;
        let response = self
            .http
            .get(format!("{}/languages", self.config.base_url))
            .headers(self.auth_headers(stage)?)
            .send()
            .await
            .map_err(|e| Self::transport_error(stage, e))?;
        let response = Self::check_status(stage, response).await?;
        response
            .json()
            .await
            .map_err(|e| Self::transport_error(stage, e))
    }
}

#[async_trait]
impl ExecutionEngine for Judge0Client {
    async fn submit_batch(&self, requests: &[SubmissionRequest]) -> JudgeResult<Vec<Token>> {
        let stage = Stage::Submit;
        let body = BatchSubmitBody {
            submissions: requests
                .iter()
                .map(|r| WireSubmission {
                    source_code: self.encode(&r.source_code),
                    language_id: r.language_id,
                    stdin: self.encode(&r.stdin),
                    expected_output: self.encode(&r.expected_output),
                })
                .collect(),
        };

        debug!(batch_size = requests.len(), "Submitting batch to engine");

        let response = self
            .http
            .post(self.batch_url())
            .query(&[("base64_encoded", self.base64_flag())])
            .headers(self.auth_headers(stage)?)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::transport_error(stage, e))?;
        let response = Self::check_status(stage, response).await?;

        let entries: Vec<WireToken> = response
            .json()
            .await
            .map_err(|e| Self::transport_error(stage, e))?;

        if entries.len() != requests.len() {
            return Err(JudgeError::unavailable(
                stage,
                format!(
                    "engine returned {} tokens for {} submissions",
                    entries.len(),
                    requests.len()
                ),
            ));
        }

        entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| match entry.token {
                Some(token) => Ok(Token::new(token)),
                None => Err(JudgeError::unavailable(
                    stage,
                    format!(
                        "submission {} rejected: {}",
                        index,
                        serde_json::Value::Object(entry.errors)
                    ),
                )),
            })
            .collect()
    }

    async fn fetch_batch(&self, tokens: &[Token]) -> JudgeResult<Vec<ExecutionResult>> {
        let stage = Stage::Poll;
        let joined = tokens
            .iter()
            .map(Token::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .http
            .get(self.batch_url())
            .query(&[
                ("tokens", joined.as_str()),
                ("base64_encoded", self.base64_flag()),
                ("fields", "*"),
            ])
            .headers(self.auth_headers(stage)?)
            .send()
            .await
            .map_err(|e| Self::transport_error(stage, e))?;
        let response = Self::check_status(stage, response).await?;

        let body: BatchStatusBody = response
            .json()
            .await
            .map_err(|e| Self::transport_error(stage, e))?;

        body.submissions
            .into_iter()
            .enumerate()
            .map(|(index, entry)| match entry {
                Some(wire) => self.to_execution_result(wire),
                None => Err(JudgeError::unavailable(
                    stage,
                    format!(
                        "engine does not know token {}",
                        tokens.get(index).map(Token::as_str).unwrap_or("<extra>")
                    ),
                )),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lenient_numbers() {
        assert_eq!(lenient_f64(Some(json!("0.042"))), Some(0.042));
        assert_eq!(lenient_f64(Some(json!(1.5))), Some(1.5));
        assert_eq!(lenient_f64(Some(json!(null))), None);
        assert_eq!(lenient_f64(None), None);
        assert_eq!(lenient_u64(Some(json!(3456))), Some(3456));
        assert_eq!(lenient_u64(Some(json!("789"))), Some(789));
    }

    #[test]
    fn test_truncate_long_bodies() {
        let long = "x".repeat(500);
        let cut = truncate(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.len(), MAX_ERROR_BODY_CHARS + 3);
        assert_eq!(truncate("  short \n"), "short");
    }

    #[test]
    fn test_wire_token_captures_item_errors() {
        let entries: Vec<WireToken> =
            serde_json::from_str(r#"[{"token":"a"},{"language_id":["can't be blank"]}]"#).unwrap();
        assert_eq!(entries[0].token.as_deref(), Some("a"));
        assert!(entries[1].token.is_none());
        assert!(entries[1].errors.contains_key("language_id"));
    }

    #[test]
    fn test_wire_result_status_fallback() {
        let body: BatchStatusBody = serde_json::from_str(
            r#"{"submissions":[{"token":"t","status":{"id":3,"description":"Accepted"},"time":"0.01","memory":900}, null]}"#,
        )
        .unwrap();
        assert_eq!(body.submissions.len(), 2);
        assert!(body.submissions[1].is_none());

        let config = EngineConfig::new(
            "http://localhost",
            judgeflow_common::config::ApiKeySource::Static("k".into()),
        );
        let client = Judge0Client::new(config).unwrap();
        let wire = body.submissions.into_iter().next().flatten().unwrap();
        let result = client.to_execution_result(wire).unwrap();
        assert_eq!(result.status_id, 3);
        assert_eq!(result.status_description.as_deref(), Some("Accepted"));
        assert_eq!(result.time, Some(0.01));
        assert_eq!(result.memory, Some(900));
    }
}
