//! Request interceptors wrapped around the transport.
//!
//! Layers run in registration order on the way in and in reverse order on
//! the way out. The innermost step is whatever [`Requester`] the chain is
//! dispatched to, normally the retrying transport.

use crate::transport::{RestRequest, RestResponse, Requester};
use async_trait::async_trait;
use indexmap::IndexMap;
use redrest_core::TransportError;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(
        &self,
        request: RestRequest,
        next: Next<'_>,
    ) -> Result<RestResponse, TransportError>;
}

/// The rest of the chain after the current layer.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Requester,
}

impl<'a> Next<'a> {
    pub async fn run(self, request: RestRequest) -> Result<RestResponse, TransportError> {
        match self.remaining.split_first() {
            Some((current, rest)) => {
                let next = Next {
                    remaining: rest,
                    endpoint: self.endpoint,
                };
                current.handle(request, next).await
            }
            None => self.endpoint.send(request).await,
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.remaining.len())
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct MiddlewareChain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<M: Middleware + 'static>(&mut self, middleware: M) {
        self.layers.push(Arc::new(middleware));
    }

    pub fn push_arc(&mut self, middleware: Arc<dyn Middleware>) {
        self.layers.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub async fn dispatch(
        &self,
        request: RestRequest,
        endpoint: &dyn Requester,
    ) -> Result<RestResponse, TransportError> {
        Next {
            remaining: &self.layers,
            endpoint,
        }
        .run(request)
        .await
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("layers", &self.layers.len())
            .finish()
    }
}

/// Adds fixed headers to every request that passes through.
#[derive(Debug, Clone, Default)]
pub struct StaticHeaders {
    headers: IndexMap<String, String>,
}

impl StaticHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[async_trait]
impl Middleware for StaticHeaders {
    async fn handle(
        &self,
        mut request: RestRequest,
        next: Next<'_>,
    ) -> Result<RestResponse, TransportError> {
        for (name, value) in &self.headers {
            request.set_header(name.as_str(), value.as_str());
        }
        next.run(request).await
    }
}

/// Logs the wall-clock latency of every request at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatencyLogger;

#[async_trait]
impl Middleware for LatencyLogger {
    async fn handle(
        &self,
        request: RestRequest,
        next: Next<'_>,
    ) -> Result<RestResponse, TransportError> {
        let path = request.path.join("/").to_uppercase();
        let commands = request
            .body()
            .iter()
            .map(|c| c.name().to_uppercase())
            .collect::<Vec<_>>()
            .join(",");
        let started = Instant::now();
        let result = next.run(request).await;
        info!(
            path = %path,
            commands = %commands,
            latency_ms = %format!("{:.2}", started.elapsed().as_secs_f64() * 1000.0),
            ok = result.is_ok(),
            "request latency"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redrest_core::{Batch, Command};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct Echo;

    #[async_trait]
    impl Requester for Echo {
        async fn send(&self, request: RestRequest) -> Result<RestResponse, TransportError> {
            let headers: Value = request
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect::<serde_json::Map<_, _>>()
                .into();
            Ok(RestResponse::ok(headers))
        }
    }

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Recording {
        async fn handle(
            &self,
            request: RestRequest,
            next: Next<'_>,
        ) -> Result<RestResponse, TransportError> {
            self.log.lock().unwrap().push(format!("{} in", self.name));
            let response = next.run(request).await;
            self.log.lock().unwrap().push(format!("{} out", self.name));
            response
        }
    }

    fn request() -> RestRequest {
        let batch: Batch = vec![Command::new("ping")].into();
        RestRequest::new(vec!["pipeline".into()], batch)
    }

    #[tokio::test]
    async fn test_onion_ordering() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.push(Recording {
            name: "outer",
            log: log.clone(),
        });
        chain.push(Recording {
            name: "inner",
            log: log.clone(),
        });

        chain.dispatch(request(), &Echo).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer in", "inner in", "inner out", "outer out"]
        );
    }

    #[tokio::test]
    async fn test_empty_chain_calls_endpoint() {
        let chain = MiddlewareChain::new();
        let response = chain.dispatch(request(), &Echo).await.unwrap();
        assert_eq!(response.body, json!({}));
    }

    #[tokio::test]
    async fn test_static_headers() {
        let mut chain = MiddlewareChain::new();
        chain.push(StaticHeaders::new().header("X-Trace", "abc"));
        chain.push(LatencyLogger);

        let response = chain.dispatch(request(), &Echo).await.unwrap();
        assert_eq!(response.body, json!({"x-trace": "abc"}));
    }

    struct ShortCircuit;

    #[async_trait]
    impl Middleware for ShortCircuit {
        async fn handle(
            &self,
            _request: RestRequest,
            _next: Next<'_>,
        ) -> Result<RestResponse, TransportError> {
            Err(TransportError::Protocol("blocked".into()))
        }
    }

    #[tokio::test]
    async fn test_layer_can_short_circuit() {
        let mut chain = MiddlewareChain::new();
        chain.push(ShortCircuit);
        let err = chain.dispatch(request(), &Echo).await.unwrap_err();
        assert_eq!(err, TransportError::Protocol("blocked".into()));
    }
}
