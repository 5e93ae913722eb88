use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailStashResult;
use crate::modules::scheduler::model::TaskMeta;
use crate::modules::scheduler::retry::{RetryPolicy, RetryStrategy};
use crate::raise_error;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::pin::Pin;

pub type TaskFuture = Pin<Box<dyn Future<Output = MailStashResult<()>> + Send>>;

pub trait Task: Serialize + DeserializeOwned + 'static {
    /// Unique identifier for this task type.
    const TASK_KEY: &'static str;

    /// The queue this task runs on. A task submitted to an unregistered
    /// queue is never processed.
    const TASK_QUEUE: &'static str;

    /// Retry policy. Default: exponential backoff (base 2) with 3 attempts.
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            strategy: RetryStrategy::Exponential { base: 2 },
            max_retries: Some(3),
        }
    }

    /// Delay in seconds before the first execution.
    fn delay_seconds(&self) -> u32 {
        3
    }

    /// Executes the task.
    fn run(self, task_id: u64) -> TaskFuture;

    fn validate(&self) -> MailStashResult<()> {
        if Self::TASK_QUEUE.is_empty() {
            return Err(raise_error!(
                "TASK_QUEUE must not be empty.".into(),
                ErrorCode::InternalError
            ));
        }
        Ok(())
    }

    /// Builds the persistent envelope for this task instance.
    fn new_meta(&self) -> TaskMeta {
        self.validate().unwrap_or_else(|err| {
            panic!(
                "Validation failed for task '{}': {}. This indicates a programming error.",
                Self::TASK_KEY,
                err
            )
        });

        TaskMeta::new(
            Self::TASK_KEY.to_owned(),
            serde_json::to_string(&self).expect(
                "Serialization failed: this should never happen if all fields are serializable",
            ),
            Self::TASK_QUEUE.to_owned(),
            self.retry_policy(),
            self.delay_seconds(),
        )
    }
}
