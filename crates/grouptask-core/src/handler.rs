//! User processing logic and what it may see while running.
mod tmp {
    use crate::{BatchOutcome, handler::ProcessContext, model::TaskBatch};

    /// Processes whole batches.
    ///
    /// Tasks must be attempted in batch order. When one fails, stop and
    /// return [`BatchOutcome::Failed`] naming it; the tasks after it are
    /// handed out again later.
    ///
    /// `I` is the idempotency checker reachable through the context.
    /// Handlers that do not care can implement this for any `I`.
    #[trait_variant::make(BatchHandler: Send)]
    pub trait LocalBatchHandler<I> {
        async fn process(&self, batch: &TaskBatch, context: &ProcessContext<'_, I>)
        -> BatchOutcome;
    }
}

pub use tmp::{BatchHandler, LocalBatchHandler};

use tokio_util::sync::CancellationToken;

use crate::port::IdempotencyChecker;

/// Per-batch view of the processor handed to [`BatchHandler::process`].
#[derive(Debug)]
pub struct ProcessContext<'a, I> {
    processor_id: &'a str,
    group_key: &'a str,
    cancellation: &'a CancellationToken,
    idempotency: &'a I,
}

impl<'a, I> ProcessContext<'a, I> {
    pub fn new(
        processor_id: &'a str,
        group_key: &'a str,
        cancellation: &'a CancellationToken,
        idempotency: &'a I,
    ) -> Self {
        Self {
            processor_id,
            group_key,
            cancellation,
            idempotency,
        }
    }

    pub fn processor_id(&self) -> &str {
        self.processor_id
    }

    pub fn group_key(&self) -> &str {
        self.group_key
    }

    /// The processor's shutdown token. The processor never interrupts a
    /// running handler; long handlers may watch this to stop early.
    pub fn cancellation(&self) -> &CancellationToken {
        self.cancellation
    }
}

impl<I> ProcessContext<'_, I>
where
    I: IdempotencyChecker + Sync,
{
    /// Whether a task with `idempotency_key` was already fully processed,
    /// e.g. redelivered after a commit raced with a crash.
    pub async fn is_duplicate(&self, idempotency_key: &str) -> Result<bool, I::Error> {
        self.idempotency
            .is_duplicate(idempotency_key, self.cancellation)
            .await
    }
}
