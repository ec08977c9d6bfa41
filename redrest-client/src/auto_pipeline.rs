//! Coalesces commands issued in the same scheduling tick into one request.
//!
//! The first enqueue of a tick opens a batch and spawns its flush task. The
//! task yields once so that every command issued before control returns to
//! the runtime lands in the same batch, then takes the batch and sends it.
//! Commands enqueued after the take start the next batch.
//!
//! On a `current_thread` runtime coalescing is exact. On a multi-thread
//! runtime another worker may run the flush task early, which only splits a
//! tick's commands across more than one request.

use crate::executor::Executor;
use futures::future::{self, BoxFuture, FutureExt};
use redrest_core::{Batch, BatchKind, Command, CommandResult, RedisError, TransportError};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::trace;

/// Verbs tied to connection state or streaming; they are never batched.
const BYPASS_VERBS: &[&str] = &[
    "DISCARD",
    "EXEC",
    "MONITOR",
    "MULTI",
    "PSUBSCRIBE",
    "SUBSCRIBE",
    "UNWATCH",
    "WATCH",
];

pub(crate) fn bypasses_auto_pipeline(verb: &str) -> bool {
    BYPASS_VERBS.iter().any(|v| v.eq_ignore_ascii_case(verb))
}

/// One caller waiting on a slot of the batch under assembly.
struct PendingCall {
    slot: usize,
    settle: oneshot::Sender<CommandResult>,
}

#[derive(Default)]
struct PendingBatch {
    batch: Batch,
    calls: Vec<PendingCall>,
}

struct Shared {
    executor: Arc<Executor>,
    pending: Mutex<Option<PendingBatch>>,
    batches: AtomicU64,
}

impl Shared {
    fn lock_pending(&self) -> MutexGuard<'_, Option<PendingBatch>> {
        // the guarded state is only a Vec push or a take, so a poisoned lock is still consistent
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn flush(self: Arc<Self>) {
        tokio::task::yield_now().await;

        let Some(PendingBatch { batch, calls }) = self.lock_pending().take() else {
            return;
        };
        let number = self.batches.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(batch = number, commands = batch.len(), "flushing auto-pipeline");

        match self.executor.dispatch(batch, BatchKind::Pipeline).await {
            Ok(results) => {
                let mut results: Vec<Option<CommandResult>> =
                    results.into_iter().map(Some).collect();
                for call in calls {
                    let result = results
                        .get_mut(call.slot)
                        .and_then(Option::take)
                        .unwrap_or_else(|| {
                            Err(TransportError::Protocol(format!(
                                "no result for slot {}",
                                call.slot
                            ))
                            .into())
                        });
                    // the caller may have stopped waiting; the batch still ran
                    let _ = call.settle.send(result);
                }
            }
            Err(err) => {
                for call in calls {
                    let _ = call.settle.send(Err(err.clone()));
                }
            }
        }
    }
}

/// Per-client auto-pipelining scheduler.
#[derive(Clone)]
pub(crate) struct AutoPipeline {
    shared: Arc<Shared>,
}

impl AutoPipeline {
    pub(crate) fn new(executor: Arc<Executor>) -> Self {
        Self {
            shared: Arc::new(Shared {
                executor,
                pending: Mutex::new(None),
                batches: AtomicU64::new(0),
            }),
        }
    }

    /// Number of batches sent so far.
    pub(crate) fn counter(&self) -> u64 {
        self.shared.batches.load(Ordering::SeqCst)
    }

    /// Appends an encoded command to the current batch.
    ///
    /// Enqueueing happens before this returns; the returned future only
    /// waits for the outcome.
    pub(crate) fn enqueue(&self, command: Command) -> BoxFuture<'static, CommandResult> {
        let Ok(handle) = Handle::try_current() else {
            return future::ready(Err(RedisError::validation(
                "auto-pipelining requires a running tokio runtime",
            )))
            .boxed();
        };

        let (settle, settled) = oneshot::channel();
        let opened = {
            let mut pending = self.shared.lock_pending();
            let opened = pending.is_none();
            let current = pending.get_or_insert_with(PendingBatch::default);
            let slot = current.batch.push(command);
            current.calls.push(PendingCall { slot, settle });
            opened
        };

        if opened {
            handle.spawn(self.shared.clone().flush());
        }

        async move {
            settled.await.unwrap_or_else(|_| {
                Err(TransportError::Protocol(
                    "batch was dropped before its result arrived".to_string(),
                )
                .into())
            })
        }
        .boxed()
    }
}

impl fmt::Debug for AutoPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoPipeline")
            .field("batches", &self.counter())
            .finish()
    }
}
