#![allow(dead_code)]

use std::{
    collections::{HashSet, VecDeque},
    sync::Mutex,
    time::Duration,
};

use grouptask_core::{
    BatchCompleted, BatchFailure, BatchHandler, BatchOutcome, CancellationToken, Consumer,
    IdempotencyChecker, ProcessContext, Task, TaskBatch, TaskFailure, TaskId,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn task(group_key: &str, id: i64) -> Task {
    Task {
        id: TaskId(id),
        idempotency_key: format!("{group_key}:{id}"),
        enqueued_at: chrono::Utc::now(),
        attempts: 0,
        domain: Some("test_domain".into()),
        task_type: "test_task_type".into(),
        data: Vec::new(),
    }
}

pub fn batch(group_key: &str, ids: &[i64]) -> TaskBatch {
    TaskBatch::new(group_key, ids.iter().map(|&id| task(group_key, id)).collect())
}

pub fn ids(raw: &[i64]) -> Vec<TaskId> {
    raw.iter().copied().map(TaskId).collect()
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct QueueError(pub String);

/// What the next fetch returns.
#[derive(Debug)]
pub enum Fetch {
    Batch(TaskBatch),
    Nothing,
    Empty,
    Error(&'static str),
    /// Cancel the processor's token while the fetch is in flight, then
    /// return the given result.
    CancelWith(Option<TaskBatch>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetTasks {
        max_count: usize,
        wait_timeout: Duration,
    },
    GetTasksForGroup {
        max_count: usize,
        group_key: String,
        wait_timeout: Duration,
    },
    Commit(BatchCompleted),
    Fail(BatchFailure, Option<Duration>),
}

/// Consumer that replays a script and records every call. Once the script
/// runs out it cancels the token, so `run` always terminates.
pub struct ScriptedConsumer {
    script: VecDeque<Fetch>,
    calls: Vec<Call>,
    cancellation: CancellationToken,
    failing_commits: usize,
}

impl ScriptedConsumer {
    pub fn new(cancellation: CancellationToken, script: impl IntoIterator<Item = Fetch>) -> Self {
        Self {
            script: script.into_iter().collect(),
            calls: Vec::new(),
            cancellation,
            failing_commits: 0,
        }
    }

    /// Make the next `count` commits fail.
    pub fn failing_commits(self, count: usize) -> Self {
        Self {
            failing_commits: count,
            ..self
        }
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn fetch_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::GetTasks { .. } | Call::GetTasksForGroup { .. }))
            .count()
    }

    pub fn commits(&self) -> Vec<&BatchCompleted> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Commit(completed) => Some(completed),
                _ => None,
            })
            .collect()
    }

    pub fn fails(&self) -> Vec<(&BatchFailure, Option<Duration>)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Fail(failure, retry_after) => Some((failure, *retry_after)),
                _ => None,
            })
            .collect()
    }

    fn next_fetch(&mut self) -> Result<Option<TaskBatch>, QueueError> {
        match self.script.pop_front() {
            Some(Fetch::Batch(batch)) => Ok(Some(batch)),
            Some(Fetch::Nothing) => Ok(None),
            Some(Fetch::Empty) => Ok(Some(TaskBatch::empty("test_group_key"))),
            Some(Fetch::Error(message)) => Err(QueueError(message.into())),
            Some(Fetch::CancelWith(result)) => {
                self.cancellation.cancel();
                Ok(result)
            }
            None => {
                self.cancellation.cancel();
                Ok(None)
            }
        }
    }
}

impl Consumer for ScriptedConsumer {
    type Error = QueueError;

    async fn get_tasks(
        &mut self,
        max_count: usize,
        wait_timeout: Duration,
        _cancellation: &CancellationToken,
    ) -> Result<Option<TaskBatch>, Self::Error> {
        self.calls.push(Call::GetTasks {
            max_count,
            wait_timeout,
        });
        self.next_fetch()
    }

    async fn get_tasks_for_group(
        &mut self,
        max_count: usize,
        group_key: &str,
        wait_timeout: Duration,
        _cancellation: &CancellationToken,
    ) -> Result<Option<TaskBatch>, Self::Error> {
        self.calls.push(Call::GetTasksForGroup {
            max_count,
            group_key: group_key.to_owned(),
            wait_timeout,
        });
        self.next_fetch()
    }

    async fn commit(
        &mut self,
        completed: BatchCompleted,
        _cancellation: &CancellationToken,
    ) -> Result<(), Self::Error> {
        self.calls.push(Call::Commit(completed));
        if self.failing_commits > 0 {
            self.failing_commits -= 1;
            return Err(QueueError("commit rejected".into()));
        }
        Ok(())
    }

    async fn fail(
        &mut self,
        failure: BatchFailure,
        retry_after: Option<Duration>,
        _cancellation: &CancellationToken,
    ) -> Result<(), Self::Error> {
        self.calls.push(Call::Fail(failure, retry_after));
        Ok(())
    }
}

/// Handler returning pre-baked outcomes, `Complete` once they run out.
#[derive(Default)]
pub struct ScriptedHandler {
    outcomes: Mutex<VecDeque<BatchOutcome>>,
    seen: Mutex<Vec<Vec<TaskId>>>,
}

impl ScriptedHandler {
    pub fn new(outcomes: impl IntoIterator<Item = BatchOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            seen: Mutex::default(),
        }
    }

    pub fn failing_at(failed_task_id: i64) -> Self {
        Self::new([TaskFailure::new(TaskId(failed_task_id), "Testing failure")
            .error_code(10060)
            .retry_after(Duration::from_secs(30))
            .into()])
    }

    /// Task ids of every batch the handler was given.
    pub fn seen(&self) -> Vec<Vec<TaskId>> {
        self.seen.lock().unwrap().clone()
    }
}

impl<I> BatchHandler<I> for ScriptedHandler
where
    I: Sync,
{
    async fn process(&self, batch: &TaskBatch, _context: &ProcessContext<'_, I>) -> BatchOutcome {
        self.seen.lock().unwrap().push(batch.task_ids().collect());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(BatchOutcome::Complete)
    }
}

/// Idempotency checker backed by a fixed set of processed keys.
#[derive(Debug, Default)]
pub struct ProcessedKeys(pub HashSet<String>);

impl IdempotencyChecker for ProcessedKeys {
    type Error = std::convert::Infallible;

    async fn is_duplicate(
        &self,
        idempotency_key: &str,
        _cancellation: &CancellationToken,
    ) -> Result<bool, Self::Error> {
        Ok(self.0.contains(idempotency_key))
    }
}

/// Handler that skips tasks already processed according to the
/// idempotency checker and records the keys it actually handled.
#[derive(Default)]
pub struct DedupHandler {
    handled: Mutex<Vec<String>>,
}

impl DedupHandler {
    pub fn handled(&self) -> Vec<String> {
        self.handled.lock().unwrap().clone()
    }
}

impl<I> BatchHandler<I> for DedupHandler
where
    I: IdempotencyChecker + Sync,
{
    async fn process(&self, batch: &TaskBatch, context: &ProcessContext<'_, I>) -> BatchOutcome {
        for task in &batch.tasks {
            let duplicate = match context.is_duplicate(&task.idempotency_key).await {
                Ok(duplicate) => duplicate,
                Err(error) => return TaskFailure::new(task.id, error.to_string()).into(),
            };
            if !duplicate {
                let mut handled = self.handled.lock().unwrap();
                handled.push(task.idempotency_key.clone());
            }
        }
        BatchOutcome::Complete
    }
}
