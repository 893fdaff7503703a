pub use grouptask_core::{
    BatchCompleted, BatchFailure, BatchHandler, BatchOutcome, CancellationToken, Consumer,
    IdempotencyChecker, NeverDuplicate, ProcessContext, Processor, ProcessorBuilder,
    ProcessorConfig, ProcessorError, Publisher, Task, TaskBatch, TaskClient, TaskFailure, TaskId,
};
pub use grouptask_core::{config, error, handler, model, outcome, port, processor, report};

#[cfg(feature = "rt-tokio")]
pub use grouptask_core::{ProcessorHandle, TokioSpawner};
