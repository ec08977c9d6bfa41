// redrest client
// Entry point for issuing Redis commands over the REST endpoint:
// - single commands, auto-pipelined by default
// - explicit pipelines and transactions
// - custom transports and request middleware

use crate::auto_pipeline::{bypasses_auto_pipeline, AutoPipeline};
use crate::config::ClientConfig;
use crate::executor::Executor;
use crate::pipeline::Pipeline;
use crate::script::Script;
use futures::future::{self, BoxFuture, FutureExt};
use reqwest::Client as HttpClient;
use redrest_core::{BatchKind, Codec, Command, CommandResult, RedisError};
use redrest_transport::{
    HttpConfig, HttpTransport, LatencyLogger, Middleware, MiddlewareChain, Requester,
    RetryingRequester, StaticHeaders,
};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Builds a [`Redis`] client with an optional custom transport and middleware.
pub struct ClientBuilder {
    config: ClientConfig,
    requester: Option<Arc<dyn Requester>>,
    http_client: Option<HttpClient>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            requester: None,
            http_client: None,
            middleware: Vec::new(),
        }
    }

    /// Replaces the HTTP transport. The configured url is then not used;
    /// the token and headers are still attached to every request.
    pub fn requester<R: Requester + 'static>(self, requester: R) -> Self {
        self.requester_arc(Arc::new(requester))
    }

    pub fn requester_arc(mut self, requester: Arc<dyn Requester>) -> Self {
        self.requester = Some(requester);
        self
    }

    /// Uses a preconfigured `reqwest::Client` for the HTTP transport.
    pub fn http_client(mut self, http_client: HttpClient) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Adds a middleware layer; layers run in the order they are added.
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn build(self) -> Result<Redis, RedisError> {
        let ClientBuilder {
            config,
            requester,
            http_client,
            middleware,
        } = self;

        let mut chain = MiddlewareChain::new();
        if config.latency_logging {
            chain.push(LatencyLogger);
        }
        for layer in middleware {
            chain.push_arc(layer);
        }

        let requester: Arc<dyn Requester> = match requester {
            Some(requester) => {
                let mut headers = StaticHeaders::new();
                for (name, value) in &config.headers {
                    headers = headers.header(name.as_str(), value.as_str());
                }
                if !config.token.is_empty() {
                    headers = headers.header("authorization", bearer(&config.token));
                }
                if !headers.is_empty() {
                    chain.push(headers);
                }
                requester
            }
            None => {
                config.validate()?;
                let mut headers = config.headers.clone();
                headers.insert("authorization".to_string(), bearer(&config.token));
                let http_config = HttpConfig {
                    base_url: config.url.trim().to_string(),
                    headers,
                    timeout: config.timeout,
                    response_encoding: config.response_encoding,
                    read_your_writes: config.read_your_writes,
                    keep_alive: config.keep_alive,
                };
                let transport = match http_client {
                    Some(http_client) => HttpTransport::with_client(http_config, http_client),
                    None => HttpTransport::new(http_config)?,
                };
                Arc::new(transport)
            }
        };

        let codec = Codec::new(config.compression, config.automatic_deserialization);
        let endpoint = RetryingRequester::new(requester, config.retry.clone());
        let executor = Arc::new(Executor::new(codec, chain, endpoint));
        let auto_pipeline = config
            .enable_auto_pipelining
            .then(|| AutoPipeline::new(executor.clone()));

        debug!(
            auto_pipelining = config.enable_auto_pipelining,
            compression = config.compression.enabled,
            "client ready"
        );

        Ok(Redis {
            inner: Arc::new(ClientInner {
                executor,
                auto_pipeline,
            }),
        })
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("custom_requester", &self.requester.is_some())
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token.trim())
}

#[derive(Debug)]
struct ClientInner {
    executor: Arc<Executor>,
    auto_pipeline: Option<AutoPipeline>,
}

/// Redis client over HTTP. Cheap to clone; clones share one scheduler.
#[derive(Debug, Clone)]
pub struct Redis {
    inner: Arc<ClientInner>,
}

impl Redis {
    pub fn new(config: ClientConfig) -> Result<Self, RedisError> {
        ClientBuilder::new(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Connects using `REDIS_REST_URL` / `REDIS_REST_TOKEN` or their fallbacks.
    pub fn from_env() -> Result<Self, RedisError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Runs one command.
    ///
    /// The command is encoded and, with auto-pipelining on, queued before
    /// this returns, so commands issued back to back without awaiting share
    /// one request.
    pub fn execute(&self, command: Command) -> BoxFuture<'static, CommandResult> {
        let encoded = match self.inner.executor.encode(&command) {
            Ok(encoded) => encoded,
            Err(err) => return future::ready(Err(err)).boxed(),
        };

        match &self.inner.auto_pipeline {
            Some(scheduler) if !bypasses_auto_pipeline(encoded.name()) => {
                scheduler.enqueue(encoded)
            }
            _ => {
                let executor = self.inner.executor.clone();
                async move { executor.execute_one(encoded).await }.boxed()
            }
        }
    }

    /// Runs one command in its own request, skipping auto-pipelining.
    pub async fn execute_direct(&self, command: Command) -> CommandResult {
        let encoded = self.inner.executor.encode(&command)?;
        self.inner.executor.execute_one(encoded).await
    }

    /// Commands sent together, executed in order without atomicity.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.inner.executor.clone(), BatchKind::Pipeline)
    }

    /// Commands sent together and executed atomically.
    pub fn multi(&self) -> Pipeline {
        Pipeline::new(self.inner.executor.clone(), BatchKind::Transaction)
    }

    /// Number of requests the auto-pipelining scheduler has sent; 0 when disabled.
    pub fn pipeline_counter(&self) -> u64 {
        self.inner
            .auto_pipeline
            .as_ref()
            .map_or(0, AutoPipeline::counter)
    }

    pub fn auto_pipelining_enabled(&self) -> bool {
        self.inner.auto_pipeline.is_some()
    }

    pub fn codec(&self) -> &Codec {
        self.inner.executor.codec()
    }

    pub fn create_script(&self, source: impl Into<String>) -> Script {
        Script::new(self.clone(), source.into(), false)
    }

    /// A script whose `exec` uses `EVALSHA_RO` / `EVAL_RO`.
    pub fn create_script_ro(&self, source: impl Into<String>) -> Script {
        Script::new(self.clone(), source.into(), true)
    }
}
