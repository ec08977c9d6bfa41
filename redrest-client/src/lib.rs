//! Redis over HTTP.
//!
//! ```no_run
//! # async fn demo() -> Result<(), redrest_client::RedisError> {
//! use redrest_client::{ClientConfig, Redis};
//!
//! let redis = Redis::new(ClientConfig::new("https://example.upstash.io", "token"))?;
//!
//! // issued in the same tick, sent as one request
//! let (set, incr) = tokio::join!(redis.set("greeting", "hello"), redis.incr("visits"));
//! set?;
//! incr?;
//!
//! let mut tx = redis.multi();
//! tx.push(redrest_client::cmd::incr("a"))?
//!     .push(redrest_client::cmd::incr("b"))?;
//! let results = tx.exec().await?;
//! # let _ = results;
//! # Ok(())
//! # }
//! ```

mod auto_pipeline;
pub mod client;
pub mod commands;
pub mod config;
mod executor;
pub mod logging;
pub mod pipeline;
pub mod script;

pub use client::{ClientBuilder, Redis};
pub use commands::{cmd, Expiry, SetCondition, SetOptions};
pub use config::ClientConfig;
pub use pipeline::Pipeline;
pub use script::Script;

pub use redrest_core::{
    Arg, BatchKind, Codec, Command, CommandResult, CompressionConfig, ErrorKind, RedisError,
    TransportError,
};
pub use redrest_transport::{
    HttpConfig, HttpTransport, LatencyLogger, Middleware, Next, RestRequest, RestResponse,
    Requester, ResponseEncoding, RetryPolicy, StaticHeaders,
};
