//! Queue-facing traits: fetch batches, report outcomes, publish, dedupe.
//!
//! The processor drives; the queue stores. Leasing, delivery and backoff
//! policy live behind these traits and are never reimplemented by the loop.
//!
//! Every call takes the processor's [`CancellationToken`] so implementations
//! can abort blocking I/O early. Returning an error is always allowed and is
//! handled by the processor's backoff.
mod tmp {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use crate::model::{
        BatchCompleted, BatchFailure, BatchPublishInfo, BatchPublishRequest, PublishInfo,
        PublishRequest, TaskBatch,
    };

    /// Pulls batches from the queue and settles them.
    #[trait_variant::make(Consumer: Send)]
    pub trait LocalConsumer {
        type Error: std::error::Error + Send + Sync + 'static;

        /// Fetch up to `max_count` tasks for the consumer's default group,
        /// blocking for at most `wait_timeout`. `None` means nothing was
        /// available in time.
        async fn get_tasks(
            &mut self,
            max_count: usize,
            wait_timeout: Duration,
            cancellation: &CancellationToken,
        ) -> Result<Option<TaskBatch>, Self::Error>;

        /// Same as [`get_tasks`](Self::get_tasks), scoped to `group_key`.
        async fn get_tasks_for_group(
            &mut self,
            max_count: usize,
            group_key: &str,
            wait_timeout: Duration,
            cancellation: &CancellationToken,
        ) -> Result<Option<TaskBatch>, Self::Error>;

        /// Mark tasks as done so they are never delivered again.
        ///
        /// Never called with an empty id list.
        async fn commit(
            &mut self,
            completed: BatchCompleted,
            cancellation: &CancellationToken,
        ) -> Result<(), Self::Error>;

        /// Mark the failed task and the remaining tasks for retry.
        ///
        /// `retry_after` is how long the group should rest before its next
        /// delivery. `None` lets the queue derive an exponential backoff from
        /// its own per-group failure counter.
        async fn fail(
            &mut self,
            failure: BatchFailure,
            retry_after: Option<Duration>,
            cancellation: &CancellationToken,
        ) -> Result<(), Self::Error>;
    }

    /// Writes tasks to the queue. Any write failure is an error; there is no
    /// partial success for batches.
    #[trait_variant::make(Publisher: Send)]
    pub trait LocalPublisher {
        type Error: std::error::Error + Send + Sync + 'static;

        async fn publish(
            &self,
            request: PublishRequest,
            cancellation: &CancellationToken,
        ) -> Result<PublishInfo, Self::Error>;

        async fn publish_batch(
            &self,
            request: BatchPublishRequest,
            cancellation: &CancellationToken,
        ) -> Result<BatchPublishInfo, Self::Error>;
    }

    /// Answers whether a task was already fully processed.
    #[trait_variant::make(IdempotencyChecker: Send)]
    pub trait LocalIdempotencyChecker {
        type Error: std::error::Error + Send + Sync + 'static;

        async fn is_duplicate(
            &self,
            idempotency_key: &str,
            cancellation: &CancellationToken,
        ) -> Result<bool, Self::Error>;
    }
}

pub use tmp::{
    Consumer, IdempotencyChecker, LocalConsumer, LocalIdempotencyChecker, LocalPublisher,
    Publisher,
};

/// A full queue client: both ends of the queue behind one handle.
pub trait TaskClient: Consumer + Publisher {}

impl<T> TaskClient for T where T: Consumer + Publisher {}

/// Idempotency checker that treats every key as new.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeverDuplicate;

impl IdempotencyChecker for NeverDuplicate {
    type Error = std::convert::Infallible;

    async fn is_duplicate(
        &self,
        _idempotency_key: &str,
        _cancellation: &tokio_util::sync::CancellationToken,
    ) -> Result<bool, Self::Error> {
        Ok(false)
    }
}
