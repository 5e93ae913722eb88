// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use crate::modules::{error::MailStashResult, scheduler::model::TaskMeta};
use std::future::Future;

pub trait TaskStore {
    fn store_task(&self, task: TaskMeta) -> impl Future<Output = MailStashResult<()>> + Send;

    fn store_tasks(
        &self,
        tasks: Vec<TaskMeta>,
    ) -> impl Future<Output = MailStashResult<()>> + Send;

    fn fetch_pending_tasks(&self) -> impl Future<Output = MailStashResult<Vec<TaskMeta>>> + Send;

    fn update_task_execution_status(
        &self,
        task_id: u64,
        is_success: bool,
        last_error: Option<String>,
        last_duration_ms: Option<usize>,
        retry_count: Option<usize>,
        next_run: Option<i64>,
    ) -> impl Future<Output = MailStashResult<()>> + Send;

    fn heartbeat(&self, task_id: u64) -> impl Future<Output = MailStashResult<()>> + Send;

    fn cleanup(&self) -> impl Future<Output = MailStashResult<()>> + Send;
}
