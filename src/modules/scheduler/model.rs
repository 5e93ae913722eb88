use crate::{
    id,
    modules::scheduler::retry::{RetryPolicy, RetryStrategy},
    utc_now,
};
use poem_openapi::Enum;
use serde::{Deserialize, Serialize};
use std::fmt;

type LinearInterval = u32;
type ExponentialBase = u32;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskMeta {
    pub id: u64,
    pub task_key: String,
    pub task_params: String,
    pub queue_name: String,
    pub updated_at: i64,
    pub status: TaskStatus,
    pub last_error: Option<String>,
    pub last_duration_ms: Option<usize>,
    pub retry_count: Option<usize>,
    pub next_run: i64,
    pub retry_strategy: Retry,
    pub retry_interval: u32,
    pub base_interval: u32,
    pub delay_seconds: u32,
    pub max_retries: Option<u32>,
    pub heartbeat_at: i64,
    pub created_at: i64,
}

/// Job lifecycle. Terminal states are `Completed` and `Dead`; `Failed` is
/// the awaiting-retry state with `next_run` as the backoff deadline.
#[derive(Clone, Debug, Eq, Default, PartialEq, Serialize, Deserialize, Hash, Enum)]
pub enum TaskStatus {
    /// Enqueued, waiting for its next_run instant.
    #[default]
    Queued,

    /// Picked up by a worker.
    Running,

    /// Finished successfully.
    Completed,

    /// Errored with retries remaining; rescheduled at next_run.
    Failed,

    /// Retries exhausted or the error is not retryable.
    Dead,
}

impl TaskStatus {
    pub fn code(&self) -> u32 {
        match &self {
            TaskStatus::Queued => 1,
            TaskStatus::Running => 2,
            TaskStatus::Completed => 3,
            TaskStatus::Failed => 4,
            TaskStatus::Dead => 5,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_str = match self {
            TaskStatus::Queued => "Queued",
            TaskStatus::Running => "Running",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
            TaskStatus::Dead => "Dead",
        };
        write!(f, "{}", status_str)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum Retry {
    #[default]
    Linear,
    Exponential,
}

fn to_retry(retry_policy: RetryPolicy) -> (Retry, LinearInterval, ExponentialBase) {
    match retry_policy.strategy {
        RetryStrategy::Linear { interval } => (Retry::Linear, interval, Default::default()),
        RetryStrategy::Exponential { base } => (Retry::Exponential, Default::default(), base),
    }
}

impl TaskMeta {
    pub fn new(
        task_key: String,
        task_params: String,
        queue_name: String,
        retry_policy: RetryPolicy,
        delay_seconds: u32,
    ) -> Self {
        let (retry_strategy, retry_interval, base_interval) = to_retry(retry_policy);
        Self {
            id: id!(96),
            task_key,
            task_params,
            queue_name,
            updated_at: utc_now!(),
            status: TaskStatus::Queued,
            last_error: Default::default(),
            last_duration_ms: Default::default(),
            retry_count: Default::default(),
            next_run: Default::default(),
            retry_strategy,
            retry_interval,
            base_interval,
            max_retries: retry_policy.max_retries,
            heartbeat_at: Default::default(),
            delay_seconds,
            created_at: utc_now!(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let strategy = match self.retry_strategy {
            Retry::Linear => RetryStrategy::Linear {
                interval: self.retry_interval,
            },
            Retry::Exponential => RetryStrategy::Exponential {
                base: self.base_interval,
            },
        };

        RetryPolicy {
            strategy,
            max_retries: self.max_retries,
        }
    }
}
