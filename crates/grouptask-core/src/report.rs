//! Splitting a processed batch into the calls owed to the queue.
//!
//! A batch is settled by at most one commit followed by at most one fail.
//! The commit covers the prefix that succeeded; the fail covers the failed
//! task and every task after it. Together they cover the batch exactly once.
use std::time::Duration;

use crate::{
    BatchOutcome, TaskFailure,
    error::ProcessorError,
    model::{BatchCompleted, BatchFailure, TaskBatch},
};

/// Calls to make for one batch, in order: `completed` first, then `failure`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: Option<BatchCompleted>,
    pub failure: Option<FailureReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub failure: BatchFailure,
    pub retry_after: Option<Duration>,
}

/// Work out what to commit and what to fail for `batch` given `outcome`.
///
/// Errors when a [`BatchOutcome::Failed`] names a task that is not in the
/// batch. An unclassified failure blames the first task; on an empty batch
/// there is nothing to blame and nothing is reported.
pub fn plan_report(
    batch: &TaskBatch,
    outcome: BatchOutcome,
    processor_id: &str,
) -> Result<BatchReport, ProcessorError> {
    let (failed_at, failure) = match outcome {
        BatchOutcome::Complete => {
            return Ok(BatchReport {
                completed: completed_prefix(batch, batch.len(), processor_id),
                failure: None,
            });
        }
        BatchOutcome::Failed(failure) => {
            let failed_at = batch.position_of(failure.failed_task_id).ok_or_else(|| {
                ProcessorError::UnknownFailedTask {
                    group_key: batch.group_key.clone(),
                    failed_task_id: failure.failed_task_id,
                }
            })?;
            (failed_at, failure)
        }
        BatchOutcome::Unclassified { message } => {
            let Some(first) = batch.tasks.first() else {
                return Ok(BatchReport::default());
            };
            (0, TaskFailure::new(first.id, message))
        }
    };

    let TaskFailure {
        failed_task_id,
        error_message,
        error_code,
        retry_after,
        retry_failed_task,
    } = failure;

    Ok(BatchReport {
        completed: completed_prefix(batch, failed_at, processor_id),
        failure: Some(FailureReport {
            failure: BatchFailure {
                group_key: batch.group_key.clone(),
                error_message,
                error_code,
                processor_id: processor_id.to_owned(),
                failed_task_id,
                remaining_task_ids: batch.task_ids().skip(failed_at).collect(),
                retry_failed_task,
            },
            retry_after,
        }),
    })
}

fn completed_prefix(batch: &TaskBatch, count: usize, processor_id: &str) -> Option<BatchCompleted> {
    if count == 0 {
        return None;
    }
    Some(BatchCompleted {
        group_key: batch.group_key.clone(),
        processor_id: processor_id.to_owned(),
        completed_task_ids: batch.task_ids().take(count).collect(),
    })
}
