use crate::executor::Executor;
use redrest_core::{Batch, BatchKind, Command, CommandResult, RedisError};
use serde_json::Value;
use std::sync::Arc;

/// Accumulates commands and sends them as one request on [`Pipeline::exec`].
///
/// Created by [`crate::Redis::pipeline`] (commands run in order, other
/// clients may interleave) or [`crate::Redis::multi`] (commands run
/// atomically). A pipeline can be executed once.
#[derive(Debug)]
pub struct Pipeline {
    executor: Arc<Executor>,
    kind: BatchKind,
    batch: Batch,
    executed: bool,
}

impl Pipeline {
    pub(crate) fn new(executor: Arc<Executor>, kind: BatchKind) -> Self {
        Self {
            executor,
            kind,
            batch: Batch::new(),
            executed: false,
        }
    }

    pub fn kind(&self) -> BatchKind {
        self.kind
    }

    /// Queues a command; nothing is sent until [`Pipeline::exec`].
    pub fn push(&mut self, command: Command) -> Result<&mut Self, RedisError> {
        if self.executed {
            return Err(RedisError::validation(
                "cannot add commands to a pipeline that has already been executed",
            ));
        }
        let encoded = self.executor.encode(&command)?;
        self.batch.push(encoded);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Sends all queued commands and returns one result per command, in order.
    ///
    /// `Err` means the request as a whole failed: a transport error, or for a
    /// transaction, the server aborting the group.
    pub async fn exec(&mut self) -> Result<Vec<CommandResult>, RedisError> {
        if self.executed {
            return Err(RedisError::validation(
                "pipeline has already been executed",
            ));
        }
        if self.batch.is_empty() {
            return Err(RedisError::validation("pipeline is empty"));
        }

        self.executed = true;
        let batch = std::mem::take(&mut self.batch);
        self.executor.dispatch(batch, self.kind).await
    }

    /// Like [`Pipeline::exec`] but fails on the first failed command, naming
    /// its position and verb.
    pub async fn exec_all(&mut self) -> Result<Vec<Value>, RedisError> {
        let verbs: Vec<String> = self
            .batch
            .iter()
            .map(|command| command.name().to_uppercase())
            .collect();

        self.exec()
            .await?
            .into_iter()
            .enumerate()
            .map(|(index, result)| {
                result.map_err(|err| match err {
                    RedisError::Command { message } => {
                        let verb = verbs.get(index).map(String::as_str).unwrap_or("");
                        RedisError::command(format!(
                            "Command {} [ {} ] failed: {}",
                            index + 1,
                            verb,
                            message
                        ))
                    }
                    other => other,
                })
            })
            .collect()
    }
}
