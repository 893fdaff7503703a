//! Value records exchanged with the queue.
//!
//! Everything here is plain data: the consumer port produces [`TaskBatch`]es,
//! the processor answers with [`BatchCompleted`] and [`BatchFailure`], and the
//! publisher port accepts [`PublishRequest`] / [`BatchPublishRequest`]. None of
//! these types are mutated once they cross a port boundary.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Queue-assigned task identity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        TaskId(value)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A task as delivered by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Caller supplied key used to detect redelivery of the same logical task.
    pub idempotency_key: String,
    pub enqueued_at: DateTime<Utc>,
    /// Prior attempts; `0` on first delivery.
    pub attempts: u32,
    /// Optional namespace for `task_type`.
    pub domain: Option<String>,
    /// Tells the handler how to decode `data`.
    pub task_type: String,
    pub data: Vec<u8>,
}

/// Ordered tasks fetched together for one group.
///
/// Order is the attempt order: a failure at position `i` means every task at
/// position `>= i` was not attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBatch {
    pub group_key: String,
    pub tasks: Vec<Task>,
}

impl TaskBatch {
    pub fn new(group_key: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            group_key: group_key.into(),
            tasks,
        }
    }

    /// A batch without tasks.
    pub fn empty(group_key: impl Into<String>) -> Self {
        Self::new(group_key, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Task ids in batch order.
    pub fn task_ids(&self) -> impl ExactSizeIterator<Item = TaskId> + '_ {
        self.tasks.iter().map(|task| task.id)
    }

    /// Position of `task_id` in the batch, if present.
    pub fn position_of(&self, task_id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == task_id)
    }
}

/// Tasks of a batch that finished and must not be delivered again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCompleted {
    pub group_key: String,
    /// Opaque diagnostic id of the processor that did the work.
    pub processor_id: String,
    /// Never empty.
    pub completed_task_ids: Vec<TaskId>,
}

/// The failed task of a batch plus everything after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub group_key: String,
    pub error_message: String,
    pub error_code: Option<i32>,
    pub processor_id: String,
    pub failed_task_id: TaskId,
    /// Starts with `failed_task_id`, then the rest of the batch in order.
    pub remaining_task_ids: Vec<TaskId>,
    /// When `false` the queue should reject the failed task instead of
    /// rescheduling it. The other remaining tasks are always retried.
    pub retry_failed_task: bool,
}

/// Request to enqueue a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub group_key: String,
    pub idempotency_key: String,
    pub domain: Option<String>,
    pub task_type: String,
    pub data: Vec<u8>,
}

/// One entry of a [`BatchPublishRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPublishTask {
    pub domain: Option<String>,
    pub task_type: String,
    pub data: Vec<u8>,
}

/// Request to enqueue several tasks for one group, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPublishRequest {
    pub group_key: String,
    pub tasks: Vec<BatchPublishTask>,
}

/// Receipt for a published task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishInfo {
    pub task_id: TaskId,
}

/// Receipt for a published batch, ids in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPublishInfo {
    pub task_ids: Vec<TaskId>,
}

/// A single processing attempt of a task, as recorded by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAttempt {
    pub task_id: TaskId,
    pub dequeued_at: DateTime<Utc>,
    /// When processing finished, successfully or not.
    pub completed_at: DateTime<Utc>,
    pub success: bool,
    pub error_message: Option<String>,
    pub error_code: Option<i32>,
    pub processor_id: String,
}

impl TaskAttempt {
    /// Time between dequeue and completion. Zero if the clock went backwards.
    pub fn processing_time(&self) -> std::time::Duration {
        (self.completed_at - self.dequeued_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Aggregated attempt history of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub first_attempt: TaskAttempt,
    pub last_attempt: TaskAttempt,
    pub attempts: u32,
    pub total_processing_time: std::time::Duration,
    /// Time spent queued, waiting to be picked up.
    pub total_wait_time: std::time::Duration,
}

impl AttemptSummary {
    /// A task counts as processed when its latest attempt succeeded.
    pub fn success(&self) -> bool {
        self.last_attempt.success
    }
}
