use crate::model::TaskId;

/// Errors that stop a processor.
///
/// Queue and handler failures never show up here; the processor absorbs
/// them. What remains are mistakes in the code that drives it.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// A handler blamed a task that is not part of the batch it was given.
    #[error("failed task {failed_task_id} is not part of the batch for group `{group_key}`")]
    UnknownFailedTask {
        group_key: String,
        failed_task_id: TaskId,
    },

    #[error("invalid processor configuration: {0}")]
    Config(#[from] ConfigError),

    /// The spawned processor task panicked or was aborted.
    #[cfg(feature = "rt-tokio")]
    #[error("processor task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_tasks_per_batch must be greater than 0")]
    ZeroBatchSize,
}
