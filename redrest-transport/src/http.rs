use crate::transport::{RestRequest, RestResponse, Requester};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use indexmap::IndexMap;
use redrest_core::TransportError;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, trace};

pub const ENCODING_HEADER: &str = "upstash-encoding";
pub const SYNC_TOKEN_HEADER: &str = "upstash-sync-token";

/// How the server should encode string results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseEncoding {
    /// Ask for base64 so arbitrary bytes survive JSON; decoded before return.
    #[default]
    Base64,
    None,
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL of the REST endpoint; paths are appended with `/`
    pub base_url: String,
    /// Sent on every request (the client adds `authorization` here)
    pub headers: IndexMap<String, String>,
    /// Per-request deadline
    pub timeout: Option<Duration>,
    pub response_encoding: ResponseEncoding,
    /// Carry the server's sync token forward so later reads observe earlier writes
    pub read_your_writes: bool,
    pub keep_alive: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8079".to_string(),
            headers: IndexMap::new(),
            timeout: None,
            response_encoding: ResponseEncoding::default(),
            read_your_writes: true,
            keep_alive: true,
        }
    }
}

/// Sends each batch as a single `POST` to the REST endpoint.
#[derive(Debug)]
pub struct HttpTransport {
    base_url: String,
    http_client: HttpClient,
    headers: IndexMap<String, String>,
    response_encoding: ResponseEncoding,
    read_your_writes: bool,
    sync_token: Mutex<Option<String>>,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        let mut builder = HttpClient::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if !config.keep_alive {
            builder = builder.pool_max_idle_per_host(0);
        }
        let http_client = builder
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(config, http_client))
    }

    /// Uses a caller-provided `reqwest::Client`; timeout and keep-alive
    /// settings of `config` are then the caller's responsibility.
    pub fn with_client(config: HttpConfig, http_client: HttpClient) -> Self {
        let headers = config
            .headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
            headers,
            response_encoding: config.response_encoding,
            read_your_writes: config.read_your_writes,
            sync_token: Mutex::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn sync_token(&self) -> Option<String> {
        self.sync_token.lock().ok().and_then(|token| token.clone())
    }

    fn url_for(&self, path: &[String]) -> String {
        let mut url = self.base_url.clone();
        for segment in path {
            url.push('/');
            url.push_str(segment);
        }
        url
    }

    /// Default headers, then per-request headers, then transport-managed ones.
    fn merged_headers(&self, request: &RestRequest) -> IndexMap<String, String> {
        let mut headers = IndexMap::new();
        headers.insert(CONTENT_TYPE.as_str().to_string(), "application/json".to_string());
        for (name, value) in self.headers.iter().chain(request.headers.iter()) {
            headers.insert(name.to_ascii_lowercase(), value.clone());
        }
        if self.response_encoding == ResponseEncoding::Base64 {
            headers.insert(ENCODING_HEADER.to_string(), "base64".to_string());
        }
        if self.read_your_writes {
            if let Some(token) = self.sync_token() {
                headers.insert(SYNC_TOKEN_HEADER.to_string(), token);
            }
        }
        headers
    }

    fn remember_sync_token(&self, headers: &IndexMap<String, String>) {
        if !self.read_your_writes {
            return;
        }
        if let Some(token) = headers.get(SYNC_TOKEN_HEADER) {
            if let Ok(mut slot) = self.sync_token.lock() {
                *slot = Some(token.clone());
            }
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

#[async_trait]
impl Requester for HttpTransport {
    async fn send(&self, request: RestRequest) -> Result<RestResponse, TransportError> {
        let url = self.url_for(&request.path);
        let body = serde_json::to_vec(request.body())
            .map_err(|e| TransportError::Protocol(format!("failed to encode batch: {}", e)))?;

        debug!(
            "Sending {} command(s) to {}",
            request.command_count(),
            url
        );
        trace!("Request body: {}", String::from_utf8_lossy(&body));

        let mut builder = self.http_client.post(&url);
        for (name, value) in self.merged_headers(&request) {
            builder = builder.header(name, value);
        }

        let response = builder.body(body).send().await.map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers: IndexMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        self.remember_sync_token(&headers);

        let text = response.text().await.map_err(map_reqwest_error)?;
        trace!("Response body ({}): {}", status, text);

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(body) => body,
                Err(_) if !(200..300).contains(&status) => Value::String(text.clone()),
                Err(e) => {
                    return Err(TransportError::Protocol(format!(
                        "response is not valid JSON: {}",
                        e
                    )))
                }
            }
        };

        if !(200..300).contains(&status) {
            let message = match body.get("error") {
                Some(Value::String(message)) => message.clone(),
                Some(other) => other.to_string(),
                None if text.trim().is_empty() => format!("request failed with status {}", status),
                // plain-text bodies from proxies stay visible in the error
                None => text.trim().to_string(),
            };
            return Err(TransportError::http(status, message));
        }

        let mut response = RestResponse {
            status,
            headers,
            body,
        };
        if self.response_encoding == ResponseEncoding::Base64 {
            response.body = decode_base64_body(response.body);
        }
        Ok(response)
    }
}

/// Decodes the `result` field of each outcome in a base64-encoded response.
pub fn decode_base64_body(body: Value) -> Value {
    match body {
        Value::Array(items) => Value::Array(items.into_iter().map(decode_outcome).collect()),
        other => decode_outcome(other),
    }
}

fn decode_outcome(outcome: Value) -> Value {
    match outcome {
        Value::Object(mut map) => {
            if let Some(result) = map.remove("result") {
                map.insert("result".to_string(), decode_base64_value(result));
            }
            Value::Object(map)
        }
        other => other,
    }
}

fn decode_base64_value(value: Value) -> Value {
    match value {
        Value::String(s) if s == "OK" => Value::String(s),
        Value::String(s) => Value::String(decode_base64_string(s)),
        Value::Array(items) => Value::Array(items.into_iter().map(decode_base64_value).collect()),
        other => other,
    }
}

/// Falls back to the raw string when it is not valid base64 UTF-8.
fn decode_base64_string(s: String) -> String {
    match STANDARD.decode(s.as_bytes()) {
        Ok(bytes) => String::from_utf8(bytes).unwrap_or(s),
        Err(_) => s,
    }
}
