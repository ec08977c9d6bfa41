use redrest_core::{
    parse_batch_response, Arg, Batch, BatchKind, Codec, Command, CommandResult, RedisError,
    TransportError,
};
use redrest_transport::{MiddlewareChain, RestRequest, RetryingRequester};
use tracing::{debug, trace};

/// Encodes commands and sends batches through middleware, retry and transport.
///
/// Every path that talks to the server (single commands, auto-pipelined
/// batches, explicit pipelines) goes through [`Executor::dispatch`].
#[derive(Debug)]
pub(crate) struct Executor {
    codec: Codec,
    middleware: MiddlewareChain,
    endpoint: RetryingRequester,
}

impl Executor {
    pub(crate) fn new(codec: Codec, middleware: MiddlewareChain, endpoint: RetryingRequester) -> Self {
        Self {
            codec,
            middleware,
            endpoint,
        }
    }

    pub(crate) fn codec(&self) -> &Codec {
        &self.codec
    }

    pub(crate) fn encode(&self, command: &Command) -> Result<Command, RedisError> {
        if command.is_empty() {
            return Err(RedisError::validation("command must contain at least a verb"));
        }
        if command.as_args().iter().any(Arg::is_nan) {
            return Err(RedisError::validation(format!(
                "NaN argument in {} command",
                command.name()
            )));
        }
        self.codec.encode_command(command)
    }

    /// Sends an encoded batch and returns one decoded outcome per command.
    ///
    /// `Err` means the batch as a whole failed and no command has an outcome.
    pub(crate) async fn dispatch(
        &self,
        batch: Batch,
        kind: BatchKind,
    ) -> Result<Vec<CommandResult>, RedisError> {
        let expected = batch.len();
        debug!(path = kind.path(), commands = expected, "dispatching batch");

        let request = RestRequest::new(vec![kind.path().to_string()], batch);
        let response = self.middleware.dispatch(request, &self.endpoint).await?;
        let outcomes = parse_batch_response(response.status, response.body, expected)?;
        trace!(outcomes = outcomes.len(), "batch settled");

        Ok(outcomes
            .into_iter()
            .map(|outcome| {
                outcome
                    .into_result()
                    .and_then(|value| self.codec.decode(value))
            })
            .collect())
    }

    /// Sends a single encoded command as a batch of one.
    pub(crate) async fn execute_one(&self, command: Command) -> CommandResult {
        let results = self
            .dispatch(Batch::from(vec![command]), BatchKind::Pipeline)
            .await?;
        results.into_iter().next().unwrap_or_else(|| {
            Err(TransportError::Protocol("empty response for single command".to_string()).into())
        })
    }
}
