// Runtime configuration, sourced from the environment
//
// Every loader takes a lookup closure so tests can feed settings
// without touching the process environment.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ENGINE_URL: &str = "https://judge0-ce.p.rapidapi.com";
pub const DEFAULT_API_KEY_HEADER: &str = "x-rapidapi-key";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("failed to read secret file {path}: {source}")]
    SecretFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
        None => Ok(default),
    }
}

/// Where the engine API key comes from.
///
/// `File` is re-read on every call to `current`, so a rotated secret
/// mounted on disk is picked up without a restart.
#[derive(Clone)]
pub enum ApiKeySource {
    Static(String),
    File(PathBuf),
}

impl ApiKeySource {
    pub fn current(&self) -> Result<String, ConfigError> {
        match self {
            ApiKeySource::Static(key) => Ok(key.clone()),
            ApiKeySource::File(path) => {
                let key = std::fs::read_to_string(path).map_err(|source| ConfigError::SecretFile {
                    path: path.clone(),
                    source,
                })?;
                let key = key.trim().to_string();
                if key.is_empty() {
                    return Err(ConfigError::Missing("JUDGE0_API_KEY_FILE contents"));
                }
                Ok(key)
            }
        }
    }
}

// Never print the key itself
impl fmt::Debug for ApiKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiKeySource::Static(_) => f.write_str("ApiKeySource::Static(<redacted>)"),
            ApiKeySource::File(path) => write!(f, "ApiKeySource::File({})", path.display()),
        }
    }
}

/// Connection settings for the remote execution engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub base_url: String,
    pub api_key: ApiKeySource,
    pub api_key_header: String,
    pub api_host: Option<String>,
    pub base64_encoded: bool,
    pub request_timeout: Duration,
}

impl EngineConfig {
    pub fn new(base_url: impl Into<String>, api_key: ApiKeySource) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            api_host: None,
            base64_encoded: false,
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("JUDGE0_URL").unwrap_or_else(|| DEFAULT_ENGINE_URL.to_string());

        let api_key = match (lookup("JUDGE0_API_KEY_FILE"), lookup("JUDGE0_API_KEY")) {
            (Some(path), _) => ApiKeySource::File(PathBuf::from(path)),
            (None, Some(key)) => ApiKeySource::Static(key),
            (None, None) => return Err(ConfigError::Missing("JUDGE0_API_KEY")),
        };

        let timeout_ms = parse_or(&lookup, "JUDGE0_REQUEST_TIMEOUT_MS", 10_000u64)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            api_key_header: lookup("JUDGE0_API_KEY_HEADER")
                .unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_string()),
            api_host: lookup("JUDGE0_API_HOST"),
            base64_encoded: parse_bool_or(&lookup, "JUDGE0_BASE64", false)?,
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Bounds for the result polling loop
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the second query
    pub interval: Duration,
    /// Upper bound on any single delay once backoff kicks in
    pub max_interval: Duration,
    /// 1.0 keeps the delay fixed
    pub backoff_factor: f64,
    /// Maximum number of status queries per batch
    pub max_attempts: u32,
    /// Overall wall-clock budget for polling one batch
    pub deadline: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1500),
            max_interval: Duration::from_secs(10),
            backoff_factor: 1.0,
            max_attempts: 40,
            deadline: Duration::from_secs(90),
        }
    }
}

impl PollPolicy {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let interval_ms = parse_or(&lookup, "POLL_INTERVAL_MS", defaults.interval.as_millis() as u64)?;
        let max_interval_ms =
            parse_or(&lookup, "POLL_MAX_INTERVAL_MS", defaults.max_interval.as_millis() as u64)?;
        let backoff_factor = parse_or(&lookup, "POLL_BACKOFF_FACTOR", defaults.backoff_factor)?;
        let max_attempts = parse_or(&lookup, "POLL_MAX_ATTEMPTS", defaults.max_attempts)?;
        let deadline_ms = parse_or(&lookup, "POLL_DEADLINE_MS", defaults.deadline.as_millis() as u64)?;

        if !(backoff_factor >= 1.0 && backoff_factor.is_finite()) {
            return Err(ConfigError::Invalid {
                key: "POLL_BACKOFF_FACTOR",
                value: backoff_factor.to_string(),
            });
        }
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "POLL_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }
        // a zero interval would query back to back
        if interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "POLL_INTERVAL_MS",
                value: "0".to_string(),
            });
        }
        // the deadline must leave room for at least a second query
        if deadline_ms <= interval_ms {
            return Err(ConfigError::Invalid {
                key: "POLL_DEADLINE_MS",
                value: deadline_ms.to_string(),
            });
        }

        Ok(Self {
            interval: Duration::from_millis(interval_ms),
            max_interval: Duration::from_millis(max_interval_ms.max(interval_ms)),
            backoff_factor,
            max_attempts,
            deadline: Duration::from_millis(deadline_ms),
        })
    }

    /// Delay to wait after the given (1-based) attempt came back non-terminal
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let scaled = self.interval.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = scaled.min(self.max_interval.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

/// Settings for the HTTP service
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub redis_url: String,
    pub max_concurrent_evaluations: usize,
    pub evaluation_timeout: Duration,
    pub languages_path: Option<PathBuf>,
    pub json_logs: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_concurrent_evaluations = parse_or(&lookup, "MAX_CONCURRENT_EVALUATIONS", 8usize)?;
        if max_concurrent_evaluations == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_CONCURRENT_EVALUATIONS",
                value: "0".to_string(),
            });
        }
        let timeout_ms = parse_or(&lookup, "EVALUATION_TIMEOUT_MS", 120_000u64)?;

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            max_concurrent_evaluations,
            evaluation_timeout: Duration::from_millis(timeout_ms),
            languages_path: lookup("JUDGEFLOW_LANGUAGES").map(PathBuf::from),
            json_logs: lookup("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}
