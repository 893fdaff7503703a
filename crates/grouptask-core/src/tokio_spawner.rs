//! Run a processor as a Tokio task.
//!
//! Keeps runtime concerns out of the engine: the processor itself only needs
//! a timer, this module owns spawning and joining.
use pin_project_lite::pin_project;
use tokio_util::sync::CancellationToken;

use crate::{
    error::ProcessorError,
    handler::BatchHandler,
    port::{Consumer, IdempotencyChecker},
    processor::Processor,
};

/// Spawn processors onto the Tokio runtime.
pub struct TokioSpawner;

impl TokioSpawner {
    /// Spawn `processor` with a fresh cancellation token.
    pub fn spawn<C, I, H>(processor: Processor<C, I, H>) -> ProcessorHandle
    where
        C: Consumer + Send + 'static,
        I: IdempotencyChecker + Send + Sync + 'static,
        H: BatchHandler<I> + Send + Sync + 'static,
    {
        Self::spawn_with_token(processor, CancellationToken::new())
    }

    /// Spawn `processor`; it stops when `cancellation` fires.
    pub fn spawn_with_token<C, I, H>(
        mut processor: Processor<C, I, H>,
        cancellation: CancellationToken,
    ) -> ProcessorHandle
    where
        C: Consumer + Send + 'static,
        I: IdempotencyChecker + Send + Sync + 'static,
        H: BatchHandler<I> + Send + Sync + 'static,
    {
        let token = cancellation.clone();
        let handle = tokio::spawn(async move { processor.run(token).await });
        ProcessorHandle {
            cancellation,
            handle,
        }
    }
}

pin_project! {
    /// Handle to a spawned processor. Awaiting it waits for the processor to
    /// stop; a panic inside the processor is logged and surfaced as
    /// [`ProcessorError::Join`].
    pub struct ProcessorHandle {
        cancellation: CancellationToken,
        #[pin]
        handle: tokio::task::JoinHandle<Result<(), ProcessorError>>,
    }
}

impl ProcessorHandle {
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Ask the processor to stop after its current batch.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Cancel and wait for the processor to stop.
    pub async fn shutdown(self) -> Result<(), ProcessorError> {
        self.cancel();
        self.await
    }
}

impl Future for ProcessorHandle {
    type Output = Result<(), ProcessorError>;

    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        let this = self.project();
        match this.handle.poll(cx) {
            std::task::Poll::Ready(Ok(result)) => std::task::Poll::Ready(result),
            std::task::Poll::Ready(Err(error)) => {
                tracing::error!(error = %error, "processor task panic happened");
                std::task::Poll::Ready(Err(ProcessorError::from(error)))
            }
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }
}
