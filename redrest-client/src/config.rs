use indexmap::IndexMap;
use redrest_core::{CompressionConfig, RedisError};
use redrest_transport::{ResponseEncoding, RetryPolicy};
use std::env;
use std::time::Duration;
use tracing::warn;

/// Checked in order; the first non-empty variable wins.
pub const URL_ENV_VARS: &[&str] = &["REDIS_REST_URL", "UPSTASH_REDIS_REST_URL", "KV_REST_API_URL"];
pub const TOKEN_ENV_VARS: &[&str] = &[
    "REDIS_REST_TOKEN",
    "UPSTASH_REDIS_REST_TOKEN",
    "KV_REST_API_TOKEN",
];

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST endpoint
    pub url: String,
    /// Bearer token sent in the `authorization` header
    pub token: String,
    pub retry: RetryPolicy,
    /// Parse JSON-looking string results into structured values
    pub automatic_deserialization: bool,
    /// Coalesce commands issued in the same scheduling tick into one request
    pub enable_auto_pipelining: bool,
    pub compression: CompressionConfig,
    /// Extra headers sent with every request
    pub headers: IndexMap<String, String>,
    pub response_encoding: ResponseEncoding,
    pub read_your_writes: bool,
    pub keep_alive: bool,
    /// Per-request deadline; a timed out request is retried
    pub timeout: Option<Duration>,
    /// Log the latency of every request at `info` level
    pub latency_logging: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            retry: RetryPolicy::default(),
            automatic_deserialization: true,
            enable_auto_pipelining: true,
            compression: CompressionConfig::default(),
            headers: IndexMap::new(),
            response_encoding: ResponseEncoding::default(),
            read_your_writes: true,
            keep_alive: true,
            timeout: None,
            latency_logging: false,
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            ..Default::default()
        }
    }

    /// Reads the endpoint and token from the environment.
    pub fn from_env() -> Result<Self, RedisError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`ClientConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RedisError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .find(|value| !value.is_empty())
        };

        let url = first(URL_ENV_VARS).ok_or_else(|| {
            RedisError::validation(format!(
                "unable to find environment variable: one of {}",
                URL_ENV_VARS.join(", ")
            ))
        })?;
        let token = first(TOKEN_ENV_VARS).ok_or_else(|| {
            RedisError::validation(format!(
                "unable to find environment variable: one of {}",
                TOKEN_ENV_VARS.join(", ")
            ))
        })?;

        Ok(Self::new(url, token))
    }

    /// Fails on a missing or unparsable URL and a missing token; surrounding
    /// whitespace is only warned about.
    pub fn validate(&self) -> Result<(), RedisError> {
        if self.url.is_empty() {
            return Err(RedisError::validation("the 'url' property is missing"));
        }
        if has_stray_whitespace(&self.url) {
            warn!("the redis url contains whitespace or newline, which can cause errors");
        }

        let parsed = reqwest::Url::parse(self.url.trim())
            .map_err(|e| RedisError::validation(format!("invalid url {:?}: {}", self.url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RedisError::validation(format!(
                "unsupported url scheme {:?}, expected http or https",
                parsed.scheme()
            )));
        }

        if self.token.is_empty() {
            return Err(RedisError::validation("the 'token' property is missing"));
        }
        if has_stray_whitespace(&self.token) {
            warn!("the redis token contains whitespace or newline, which can cause errors");
        }

        Ok(())
    }
}

fn has_stray_whitespace(value: &str) -> bool {
    value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
        || value.contains(['\r', '\n'])
}
