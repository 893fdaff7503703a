//! Processor engine and builder.
//!
//! One batch at a time: fetch, hand to the handler, settle with the queue,
//! repeat. Queue errors are absorbed by a fixed backoff; cancellation is
//! checked before and after each fetch and never interrupts a handler.
use std::{any::Any, borrow::Cow, panic::AssertUnwindSafe};

use futures::{FutureExt as _, future::Either};
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;

use crate::{
    BatchOutcome,
    config::{ProcessorConfig, duration_to_millis},
    error::ProcessorError,
    handler::{BatchHandler, ProcessContext},
    model::TaskBatch,
    port::{Consumer, IdempotencyChecker, NeverDuplicate},
    report::{BatchReport, FailureReport, plan_report},
};

/// Why the inner loop stopped.
enum Interrupt<E> {
    Cancelled,
    /// The queue failed; back off and start over.
    Consumer(E),
    /// A bug in the caller; stop for good.
    Fatal(ProcessorError),
}

/// Pulls batches from a [`Consumer`] and runs them through a [`BatchHandler`].
pub struct Processor<C, I, H> {
    consumer: C,
    idempotency: I,
    handler: H,
    config: ProcessorConfig,
    processor_id: Cow<'static, str>,
}

impl<C, I, H> Processor<C, I, H>
where
    C: Consumer,
    I: IdempotencyChecker + Sync,
    H: BatchHandler<I> + Sync,
{
    pub fn processor_id(&self) -> &str {
        &self.processor_id
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn consumer_ref(&self) -> &C {
        &self.consumer
    }

    pub fn handler_ref(&self) -> &H {
        &self.handler
    }

    /// Process batches until `cancellation` fires.
    ///
    /// Returns `Ok(())` once cancelled. The only error is a handler naming a
    /// failed task that is not in its batch; that batch is left unreported
    /// and the processor stops instead of retrying a bug forever.
    pub async fn run(&mut self, cancellation: CancellationToken) -> Result<(), ProcessorError> {
        let span = tracing::info_span!("processor", processor_id = %self.processor_id);
        async {
            tracing::info!(
                max_tasks_per_batch = self.config.max_tasks_per_batch,
                wait_timeout_ms = self.config.wait_timeout_ms,
                group_key = self.config.group_key.as_deref(),
                "processor started"
            );

            loop {
                match self.run_batches(&cancellation).await {
                    Interrupt::Cancelled => break,
                    Interrupt::Fatal(error) => {
                        tracing::error!(
                            error = %error,
                            "processor stopped on handler contract violation"
                        );
                        return Err(error);
                    }
                    Interrupt::Consumer(error) => {
                        tracing::error!(
                            error = %error,
                            sleep_ms = self.config.sleep_time_after_consumer_error_ms,
                            "consumer failed, backing off"
                        );
                        let sleep = self.config.sleep_time_after_consumer_error();
                        if !back_off(sleep, &cancellation).await {
                            break;
                        }
                    }
                }
            }

            tracing::info!("processor stopped");
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn run_batches(&mut self, cancellation: &CancellationToken) -> Interrupt<C::Error> {
        loop {
            if let Err(interrupt) = self.run_once(cancellation).await {
                return interrupt;
            }
        }
    }

    /// One fetch-process-report round.
    async fn run_once(
        &mut self,
        cancellation: &CancellationToken,
    ) -> Result<(), Interrupt<C::Error>> {
        if cancellation.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }

        // The fetch already waited up to `wait_timeout`, so no extra sleep on
        // an empty result.
        let Some(batch) = self.fetch(cancellation).await? else {
            tracing::trace!("no batch available");
            return Ok(());
        };
        if batch.is_empty() {
            tracing::trace!(group_key = %batch.group_key, "fetched empty batch");
            return Ok(());
        }

        if cancellation.is_cancelled() {
            // Leases expire and hand the tasks out again.
            tracing::debug!(
                group_key = %batch.group_key,
                task_count = batch.len(),
                "cancelled after fetch, leaving batch unreported"
            );
            return Err(Interrupt::Cancelled);
        }

        let outcome = {
            let context = ProcessContext::new(
                &self.processor_id,
                &batch.group_key,
                cancellation,
                &self.idempotency,
            );
            process(&self.handler, &batch, &context).await
        };
        let report =
            plan_report(&batch, outcome, &self.processor_id).map_err(Interrupt::Fatal)?;
        self.settle(report, cancellation).await
    }

    async fn fetch(
        &mut self,
        cancellation: &CancellationToken,
    ) -> Result<Option<TaskBatch>, Interrupt<C::Error>> {
        let max_count = self.config.max_tasks_per_batch;
        let wait_timeout = self.config.wait_timeout();
        let fetch = match &self.config.group_key {
            Some(group_key) => Either::Left(self.consumer.get_tasks_for_group(
                max_count,
                group_key,
                wait_timeout,
                cancellation,
            )),
            None => Either::Right(self.consumer.get_tasks(max_count, wait_timeout, cancellation)),
        };

        let fetch = fetch.fuse();
        let cancelled = cancellation.cancelled().fuse();
        futures::pin_mut!(fetch, cancelled);

        futures::select_biased! {
            _ = cancelled => Err(Interrupt::Cancelled),
            res = fetch => res.map_err(Interrupt::Consumer),
        }
    }

    /// Commit the successful prefix, then fail the rest.
    async fn settle(
        &mut self,
        report: BatchReport,
        cancellation: &CancellationToken,
    ) -> Result<(), Interrupt<C::Error>> {
        let BatchReport { completed, failure } = report;

        if let Some(completed) = completed {
            tracing::debug!(
                group_key = %completed.group_key,
                task_count = completed.completed_task_ids.len(),
                "committing tasks"
            );
            self.consumer
                .commit(completed, cancellation)
                .await
                .map_err(Interrupt::Consumer)?;
        }

        if let Some(FailureReport {
            failure,
            retry_after,
        }) = failure
        {
            tracing::debug!(
                group_key = %failure.group_key,
                failed_task_id = %failure.failed_task_id,
                task_count = failure.remaining_task_ids.len(),
                retry_after_ms = retry_after.map(duration_to_millis),
                "failing tasks"
            );
            self.consumer
                .fail(failure, retry_after, cancellation)
                .await
                .map_err(Interrupt::Consumer)?;
        }

        Ok(())
    }
}

/// Run the handler and log what it reported. A panic in the handler is
/// reported as an unclassified failure so the loop keeps going.
async fn process<I, H>(
    handler: &H,
    batch: &TaskBatch,
    context: &ProcessContext<'_, I>,
) -> BatchOutcome
where
    H: BatchHandler<I>,
{
    tracing::trace!(group_key = %batch.group_key, task_count = batch.len(), "start handler");
    let outcome = match AssertUnwindSafe(handler.process(batch, context))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(&*payload);
            tracing::error!(group_key = %batch.group_key, panic = %message, "handler panicked");
            BatchOutcome::unclassified(format!("handler panicked: {message}"))
        }
    };
    tracing::trace!(group_key = %batch.group_key, "finish handler");

    match &outcome {
        BatchOutcome::Complete => {}
        BatchOutcome::Failed(failure) => tracing::warn!(
            group_key = %batch.group_key,
            failed_task_id = %failure.failed_task_id,
            error_code = failure.error_code,
            error = %failure.error_message,
            "handler failed a task"
        ),
        BatchOutcome::Unclassified { message } => tracing::warn!(
            group_key = %batch.group_key,
            error = %message,
            "handler failed without naming a task"
        ),
    }
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Sleep after a queue error. `false` when cancelled meanwhile.
async fn back_off(sleep: std::time::Duration, cancellation: &CancellationToken) -> bool {
    let delay = futures_timer::Delay::new(sleep).fuse();
    let cancelled = cancellation.cancelled().fuse();
    futures::pin_mut!(delay, cancelled);

    futures::select_biased! {
        _ = cancelled => false,
        _ = delay => true,
    }
}

/// Builder for [`Processor`]. Consumer and handler are required; the
/// idempotency checker defaults to [`NeverDuplicate`].
pub struct ProcessorBuilder<C = (), I = NeverDuplicate, H = ()> {
    consumer: C,
    idempotency: I,
    handler: H,
    config: ProcessorConfig,
    processor_id: Cow<'static, str>,
}

impl ProcessorBuilder {
    /// Start a builder for a processor identified by `processor_id` in the
    /// queue's diagnostics.
    pub fn new(processor_id: impl Into<Cow<'static, str>>) -> Self {
        ProcessorBuilder {
            consumer: (),
            idempotency: NeverDuplicate,
            handler: (),
            config: ProcessorConfig::default(),
            processor_id: processor_id.into(),
        }
    }
}

impl<C, I, H> ProcessorBuilder<C, I, H> {
    /// Replace the whole configuration.
    pub fn config(self, config: ProcessorConfig) -> Self {
        Self { config, ..self }
    }

    pub fn max_tasks_per_batch(mut self, max_tasks_per_batch: usize) -> Self {
        self.config.max_tasks_per_batch = max_tasks_per_batch;
        self
    }

    pub fn wait_timeout(mut self, wait_timeout: std::time::Duration) -> Self {
        self.config.wait_timeout_ms = duration_to_millis(wait_timeout);
        self
    }

    pub fn sleep_time_after_consumer_error(mut self, sleep: std::time::Duration) -> Self {
        self.config.sleep_time_after_consumer_error_ms = duration_to_millis(sleep);
        self
    }

    /// Only fetch tasks of `group_key`.
    pub fn group_key(mut self, group_key: impl Into<String>) -> Self {
        self.config.group_key = Some(group_key.into());
        self
    }

    pub fn consumer<C2>(self, consumer: C2) -> ProcessorBuilder<C2, I, H>
    where
        C2: Consumer,
    {
        let Self {
            consumer: _,
            idempotency,
            handler,
            config,
            processor_id,
        } = self;
        ProcessorBuilder {
            consumer,
            idempotency,
            handler,
            config,
            processor_id,
        }
    }

    pub fn idempotency_checker<I2>(self, idempotency: I2) -> ProcessorBuilder<C, I2, H>
    where
        I2: IdempotencyChecker,
    {
        let Self {
            consumer,
            idempotency: _,
            handler,
            config,
            processor_id,
        } = self;
        ProcessorBuilder {
            consumer,
            idempotency,
            handler,
            config,
            processor_id,
        }
    }

    pub fn handler<H2>(self, handler: H2) -> ProcessorBuilder<C, I, H2> {
        let Self {
            consumer,
            idempotency,
            handler: _,
            config,
            processor_id,
        } = self;
        ProcessorBuilder {
            consumer,
            idempotency,
            handler,
            config,
            processor_id,
        }
    }
}

impl<C, I, H> ProcessorBuilder<C, I, H>
where
    C: Consumer,
    I: IdempotencyChecker + Sync,
    H: BatchHandler<I> + Sync,
{
    /// Validate the configuration and assemble the processor.
    pub fn build(self) -> Result<Processor<C, I, H>, ProcessorError> {
        self.config.validate()?;
        let Self {
            consumer,
            idempotency,
            handler,
            config,
            processor_id,
        } = self;
        Ok(Processor {
            consumer,
            idempotency,
            handler,
            config,
            processor_id,
        })
    }
}
