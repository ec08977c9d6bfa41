use async_trait::async_trait;
use indexmap::IndexMap;
use redrest_core::{Batch, TransportError};
use serde_json::Value;
use std::sync::Arc;

/// Outgoing request for one batch.
///
/// The batch itself is read-only once the request is built, so anything
/// that sees the request on its way to the transport can adjust the path
/// and headers but never the number or order of commands.
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub path: Vec<String>,
    pub headers: IndexMap<String, String>,
    body: Batch,
}

impl RestRequest {
    pub fn new(path: Vec<String>, body: Batch) -> Self {
        Self {
            path,
            headers: IndexMap::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Header names are stored lower-cased; a later value replaces an earlier one.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body(&self) -> &Batch {
        &self.body
    }

    pub fn command_count(&self) -> usize {
        self.body.len()
    }
}

/// Raw response as produced by a transport, before per-command parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    pub status: u16,
    pub headers: IndexMap<String, String>,
    pub body: Value,
}

impl RestResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: IndexMap::new(),
            body,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turns a non-2xx response into [`TransportError::Http`].
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.is_success() {
            return Ok(self);
        }
        let message = match self.body.get("error") {
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => format!("request failed with status {}", self.status),
        };
        Err(TransportError::http(self.status, message))
    }
}

/// Performs exactly one request/response exchange per call.
///
/// Implementations must not retry internally; retries belong to
/// [`crate::RetryPolicy`]. The default implementation is
/// [`crate::HttpTransport`], but tests and non-HTTP carriers can provide
/// their own.
#[async_trait]
pub trait Requester: Send + Sync {
    async fn send(&self, request: RestRequest) -> Result<RestResponse, TransportError>;
}

#[async_trait]
impl<T: Requester + ?Sized> Requester for Arc<T> {
    async fn send(&self, request: RestRequest) -> Result<RestResponse, TransportError> {
        (**self).send(request).await
    }
}
