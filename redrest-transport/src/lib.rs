pub mod middleware;
pub mod retry;
pub mod transport;
#[cfg(feature = "http")]
pub mod http;

pub use middleware::{LatencyLogger, Middleware, MiddlewareChain, Next, StaticHeaders};
pub use retry::{RetryPolicy, RetryingRequester};
pub use transport::{RestRequest, RestResponse, Requester};
#[cfg(feature = "http")]
pub use http::{HttpConfig, HttpTransport, ResponseEncoding};

pub use redrest_core::TransportError;
