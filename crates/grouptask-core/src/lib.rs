//! Core contract between a batch processor and a grouped task queue.
//!
//! - The queue hands out ordered batches per group and owns leasing and
//!   backoff ([`port`]).
//! - Handlers state what happened to a batch as a [`BatchOutcome`]; nothing
//!   is inferred from panics or hidden retries.
//! - The [`Processor`] turns outcomes into at most one commit and one fail per
//!   batch, so every task of a batch is settled exactly once.
pub mod config;
pub mod error;
pub mod handler;
pub mod model;
pub mod outcome;
pub mod port;
pub mod processor;
pub mod report;

#[cfg(feature = "rt-tokio")]
mod tokio_spawner;
#[cfg(feature = "rt-tokio")]
pub use tokio_spawner::{ProcessorHandle, TokioSpawner};

pub use config::ProcessorConfig;
pub use error::{ConfigError, ProcessorError};
pub use handler::{BatchHandler, LocalBatchHandler, ProcessContext};
pub use model::{
    AttemptSummary, BatchCompleted, BatchFailure, BatchPublishInfo, BatchPublishRequest,
    BatchPublishTask, PublishInfo, PublishRequest, Task, TaskAttempt, TaskBatch, TaskId,
};
pub use outcome::{BatchOutcome, TaskFailure};
pub use port::{Consumer, IdempotencyChecker, NeverDuplicate, Publisher, TaskClient};
pub use processor::{Processor, ProcessorBuilder};
pub use report::{BatchReport, FailureReport, plan_report};

pub use tokio_util::sync::CancellationToken;
