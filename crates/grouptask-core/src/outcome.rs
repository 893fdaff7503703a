//! What a batch handler reports back to the processor.
use std::time::Duration;

use crate::model::TaskId;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of processing one batch.
///
/// Pick the variant that matches what actually happened:
/// - `Complete`: every task in the batch is done.
/// - `Failed`: tasks before the named task are done; it and everything after
///   it were not.
/// - `Unclassified`: something broke and the handler cannot tell where. The
///   processor blames the first task, so nothing is committed.
pub enum BatchOutcome {
    Complete,
    Failed(TaskFailure),
    Unclassified { message: String },
}

impl BatchOutcome {
    /// Unclassified failure with `message`.
    pub fn unclassified(message: impl Into<String>) -> Self {
        BatchOutcome::Unclassified {
            message: message.into(),
        }
    }

    /// `Ok` becomes `Complete`, any `Err` becomes `Unclassified`.
    pub fn from_result<E>(result: Result<(), E>) -> Self
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(()) => BatchOutcome::Complete,
            Err(error) => BatchOutcome::unclassified(error.to_string()),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, BatchOutcome::Complete)
    }
}

impl From<TaskFailure> for BatchOutcome {
    fn from(value: TaskFailure) -> Self {
        BatchOutcome::Failed(value)
    }
}

impl<E> From<Result<(), E>> for BatchOutcome
where
    E: std::fmt::Display,
{
    fn from(value: Result<(), E>) -> Self {
        BatchOutcome::from_result(value)
    }
}

/// A failure pinned to one task of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub failed_task_id: TaskId,
    pub error_message: String,
    pub error_code: Option<i32>,
    /// Explicit rest period for the group, e.g. from a rate limit response.
    pub retry_after: Option<Duration>,
    /// `false` asks the queue to reject the failed task for good.
    pub retry_failed_task: bool,
}

impl TaskFailure {
    /// Retryable failure of `failed_task_id` with no code or explicit delay.
    pub fn new(failed_task_id: TaskId, error_message: impl Into<String>) -> Self {
        Self {
            failed_task_id,
            error_message: error_message.into(),
            error_code: None,
            retry_after: None,
            retry_failed_task: true,
        }
    }

    pub fn error_code(self, error_code: i32) -> Self {
        Self {
            error_code: Some(error_code),
            ..self
        }
    }

    /// Ask the queue to hold the whole group back for `retry_after`.
    pub fn retry_after(self, retry_after: Duration) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..self
        }
    }

    /// Reject the failed task instead of retrying it.
    pub fn no_retry(self) -> Self {
        Self {
            retry_failed_task: false,
            ..self
        }
    }
}
