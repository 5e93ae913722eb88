// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use crate::modules::error::code::ErrorCode;
use crate::modules::scheduler::context::TaskContext;
use crate::modules::scheduler::nativedb::meta::NativeDbTaskStore;
use crate::modules::scheduler::task::Task;
use crate::modules::sync::task::{
    AttachmentUploadTask, IncrementalSyncTask, InitialSyncTask, ATTACHMENT_UPLOAD_QUEUE,
    INCREMENTAL_SYNC_QUEUE, INITIAL_SYNC_QUEUE,
};
use crate::{
    modules::{context::Initialize, database::manager::DB_MANAGER, error::MailStashResult},
    raise_error,
};
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;

static TASK_QUEUE: OnceLock<MailStashTaskQueue> = OnceLock::new();

impl Initialize for MailStashTaskQueue {
    async fn initialize() -> MailStashResult<()> {
        let queue = MailStashTaskQueue::new().await;
        let _ = TASK_QUEUE.set(queue);
        Ok(())
    }
}

pub struct MailStashTaskQueue {
    pub task_context: Arc<RwLock<TaskContext<NativeDbTaskStore>>>,
}

impl MailStashTaskQueue {
    pub fn get() -> MailStashResult<&'static MailStashTaskQueue> {
        TASK_QUEUE.get().ok_or_else(|| {
            raise_error!("TaskQueue not initialized".into(), ErrorCode::InternalError)
        })
    }

    pub async fn new() -> Self {
        let task_store = Arc::new(NativeDbTaskStore::init(DB_MANAGER.tasks_db().clone()));
        NativeDbTaskStore::restore(DB_MANAGER.tasks_db())
            .await
            .expect("Failed to restore tasks from the scheduler metadata database");
        let task_context = TaskContext::with_arc_store(task_store.clone())
            .register::<InitialSyncTask>()
            .register::<IncrementalSyncTask>()
            .register::<AttachmentUploadTask>()
            .set_concurrency(INITIAL_SYNC_QUEUE, 2)
            .set_concurrency(INCREMENTAL_SYNC_QUEUE, 2)
            .set_concurrency(ATTACHMENT_UPLOAD_QUEUE, 2)
            .set_rate_limit(INITIAL_SYNC_QUEUE, 10)
            .set_rate_limit(INCREMENTAL_SYNC_QUEUE, 20)
            .start_with_cleaner()
            .await;
        MailStashTaskQueue {
            task_context: Arc::new(RwLock::new(task_context)),
        }
    }

    pub async fn submit_task<T>(&self, task: T, delay_seconds: Option<u32>) -> MailStashResult<()>
    where
        T: Task + Send + Sync + 'static,
    {
        let context = self.task_context.write().await;
        context
            .add_task(task, delay_seconds)
            .await
            .map_err(|message| raise_error!(message, ErrorCode::InternalError))
    }

    pub async fn submit_tasks<T>(
        &self,
        tasks: &[T],
        delay_seconds: Option<u32>,
    ) -> MailStashResult<()>
    where
        T: Task + Send + Sync + 'static,
    {
        let context = self.task_context.write().await;
        context
            .add_tasks(tasks, delay_seconds)
            .await
            .map_err(|message| raise_error!(message, ErrorCode::InternalError))
    }
}
