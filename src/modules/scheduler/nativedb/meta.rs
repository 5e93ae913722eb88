// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use std::sync::Arc;
use std::time::Instant;

use itertools::Itertools;
use native_db::Database;
use tracing::{debug, warn};

use crate::{
    modules::{
        database::{
            batch_delete_impl, batch_insert_impl, batch_update_impl, filter_by_secondary_key_impl,
            insert_impl, secondary_find_impl, update_impl,
        },
        error::{code::ErrorCode, MailStashResult},
        scheduler::{
            model::{TaskMeta, TaskStatus},
            nativedb::{TaskMetaEntity, TaskMetaEntityKey},
            store::TaskStore,
        },
    },
    raise_error, utc_now,
};

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;
const COMPLETED_KEEP_COUNT: usize = 100;
const FETCH_BATCH_LIMIT: usize = 500;

#[derive(Clone)]
pub struct NativeDbTaskStore {
    pub store: Arc<Database<'static>>,
}

impl NativeDbTaskStore {
    pub fn init(database: Arc<Database<'static>>) -> Self {
        Self {
            store: database.clone(),
        }
    }

    /// Pops every due row (Queued, or Failed whose backoff deadline passed)
    /// and marks it Running in the same transaction.
    pub async fn fetch_pending_tasks(
        database: &Arc<Database<'static>>,
    ) -> MailStashResult<Vec<TaskMeta>> {
        let start = Instant::now();
        let result: Vec<TaskMetaEntity> = batch_update_impl(
            database,
            |rw| {
                let mut candidates: Vec<TaskMetaEntity> = Vec::new();
                for status in [TaskStatus::Queued, TaskStatus::Failed] {
                    let rows: Vec<TaskMetaEntity> = rw
                        .scan()
                        .secondary(TaskMetaEntityKey::status)
                        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                        .start_with(status.code())
                        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                        .try_collect()
                        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
                    candidates.extend(rows);
                }

                Ok(candidates
                    .into_iter()
                    .filter(|c| c.next_run <= utc_now!())
                    .take(FETCH_BATCH_LIMIT)
                    .collect())
            },
            move |data| {
                let mut result = Vec::new();
                for entity in data.iter() {
                    let mut updated = entity.clone();
                    updated.status = TaskStatus::Running;
                    updated.updated_at = utc_now!();
                    result.push((entity.clone(), updated));
                }
                Ok(result)
            },
        )
        .await?;

        debug!(
            "Time taken to fetch pending tasks: {:#?}",
            start.elapsed()
        );

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn update_status(
        database: &Arc<Database<'static>>,
        task_id: u64,
        is_success: bool,
        last_error: Option<String>,
        last_duration_ms: Option<usize>,
        retry_count: Option<usize>,
        next_run: Option<i64>,
    ) -> MailStashResult<()> {
        update_impl(
            database,
            move |rw| {
                rw.get()
                    .secondary::<TaskMetaEntity>(TaskMetaEntityKey::id, task_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!(
                                "The task with id={} that you want to modify was not found.",
                                &task_id
                            ),
                            ErrorCode::ResourceNotFound
                        )
                    })
            },
            move |current| {
                let mut updated = current.clone();
                updated.last_duration_ms = last_duration_ms;
                updated.retry_count = retry_count;
                updated.updated_at = utc_now!();
                if is_success {
                    updated.status = TaskStatus::Completed;
                } else {
                    updated.last_error = last_error;
                    match next_run {
                        Some(next_run) => {
                            updated.status = TaskStatus::Failed;
                            updated.next_run = next_run;
                        }
                        None => {
                            updated.status = TaskStatus::Dead;
                        }
                    }
                }
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    /// Retention: Completed rows are kept for one hour and capped at the
    /// newest 100; Failed/Dead rows are kept for 24 hours.
    pub async fn clean_up(database: &Arc<Database<'static>>) -> MailStashResult<()> {
        let now = utc_now!();

        let mut expired: Vec<u64> = Vec::new();

        let completed: Vec<TaskMetaEntity> = filter_by_secondary_key_impl(
            database,
            TaskMetaEntityKey::status,
            TaskStatus::Completed.code(),
        )
        .await?;
        let mut live_completed: Vec<&TaskMetaEntity> = Vec::new();
        for task in completed.iter() {
            if now - task.updated_at > HOUR_MS {
                expired.push(task.id);
            } else {
                live_completed.push(task);
            }
        }
        if live_completed.len() > COMPLETED_KEEP_COUNT {
            live_completed.sort_by_key(|t| std::cmp::Reverse(t.updated_at));
            expired.extend(
                live_completed[COMPLETED_KEEP_COUNT..]
                    .iter()
                    .map(|t| t.id),
            );
        }

        for status in [TaskStatus::Failed, TaskStatus::Dead] {
            let rows: Vec<TaskMetaEntity> =
                filter_by_secondary_key_impl(database, TaskMetaEntityKey::status, status.code())
                    .await?;
            expired.extend(
                rows.into_iter()
                    .filter(|t| now - t.updated_at > DAY_MS)
                    .map(|t| t.id),
            );
        }

        for chunk in expired.chunks(100).map(|chunk| chunk.to_vec()) {
            batch_delete_impl(database, move |rw| {
                let to_delete: Vec<TaskMetaEntity> = chunk
                    .iter()
                    .filter_map(|task_id| {
                        rw.get()
                            .secondary(TaskMetaEntityKey::id, *task_id)
                            .map_err(|e| {
                                raise_error!(format!("{:#?}", e), ErrorCode::InternalError)
                            })
                            .ok()
                            .flatten()
                    })
                    .collect();
                Ok(to_delete)
            })
            .await?;
        }

        Ok(())
    }

    pub async fn heartbeat(
        database: &Arc<Database<'static>>,
        task_id: u64,
    ) -> MailStashResult<()> {
        update_impl(
            database,
            move |rw| {
                rw.get()
                    .secondary::<TaskMetaEntity>(TaskMetaEntityKey::id, task_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!(
                                "The task with id={} that you want to modify was not found.",
                                task_id
                            ),
                            ErrorCode::ResourceNotFound
                        )
                    })
            },
            move |current| {
                let mut updated = current.clone();
                updated.heartbeat_at = utc_now!();
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    /// After a crash, rows stuck in Running are requeued (or dead-lettered
    /// when their retry budget is already spent).
    pub async fn restore(database: &Arc<Database<'static>>) -> MailStashResult<()> {
        tracing::info!("starting task restore...");
        let running_tasks = filter_by_secondary_key_impl::<TaskMetaEntity>(
            database,
            TaskMetaEntityKey::status,
            TaskStatus::Running.code(),
        )
        .await?;
        if running_tasks.is_empty() {
            tracing::info!("no interrupted tasks found.");
            return Ok(());
        }
        let restored = running_tasks.len();
        let rw = database
            .rw_transaction()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        for task in running_tasks {
            let mut updated = task.clone();
            let spent = task.retry_count.unwrap_or(0);
            if spent >= task.max_retries.unwrap_or(0) as usize && spent > 0 {
                updated.status = TaskStatus::Dead;
                updated.last_error = Some(
                    "Max retries exceeded; dead-lettered during task restoration".into(),
                );
            } else {
                updated.status = TaskStatus::Queued;
            }
            updated.updated_at = utc_now!();
            rw.update(task.clone(), updated)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        }
        rw.commit()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        tracing::info!("finished task restore, {} tasks requeued.", restored);
        Ok(())
    }

    pub async fn get(
        database: &Arc<Database<'static>>,
        task_id: u64,
    ) -> MailStashResult<Option<TaskMeta>> {
        secondary_find_impl::<TaskMetaEntity>(database, TaskMetaEntityKey::id, task_id)
            .await
            .map(|opt| opt.map(Into::into))
    }

    pub async fn store_one(
        database: &Arc<Database<'static>>,
        task: TaskMeta,
    ) -> MailStashResult<()> {
        let entity: TaskMetaEntity = task.into();
        insert_impl(database, entity).await
    }

    pub async fn store_many(
        database: &Arc<Database<'static>>,
        tasks: Vec<TaskMeta>,
    ) -> MailStashResult<()> {
        let batch: Vec<TaskMetaEntity> = tasks.into_iter().map(Into::into).collect();
        batch_insert_impl(database, batch).await
    }
}

impl TaskStore for NativeDbTaskStore {
    async fn store_task(&self, task: TaskMeta) -> MailStashResult<()> {
        let db = self.store.clone();
        Self::store_one(&db, task).await
    }

    async fn store_tasks(&self, tasks: Vec<TaskMeta>) -> MailStashResult<()> {
        let db = self.store.clone();
        Self::store_many(&db, tasks).await
    }

    async fn fetch_pending_tasks(&self) -> MailStashResult<Vec<TaskMeta>> {
        let db = self.store.clone();
        Self::fetch_pending_tasks(&db).await
    }

    async fn update_task_execution_status(
        &self,
        task_id: u64,
        is_success: bool,
        last_error: Option<String>,
        last_duration_ms: Option<usize>,
        retry_count: Option<usize>,
        next_run: Option<i64>,
    ) -> MailStashResult<()> {
        let db = self.store.clone();
        if let Some(error) = &last_error {
            warn!(task_id, error = %error, "task attempt failed");
        }
        Self::update_status(
            &db,
            task_id,
            is_success,
            last_error,
            last_duration_ms,
            retry_count,
            next_run,
        )
        .await
    }

    async fn heartbeat(&self, task_id: u64) -> MailStashResult<()> {
        let db = self.store.clone();
        Self::heartbeat(&db, task_id).await
    }

    async fn cleanup(&self) -> MailStashResult<()> {
        let db = self.store.clone();
        Self::clean_up(&db).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::database::manager::DB_MANAGER;
    use crate::modules::scheduler::retry::{RetryPolicy, RetryStrategy};

    fn meta(queue: &str) -> TaskMeta {
        TaskMeta::new(
            "test-task".into(),
            "{}".into(),
            queue.into(),
            RetryPolicy {
                strategy: RetryStrategy::Exponential { base: 2 },
                max_retries: Some(3),
            },
            0,
        )
    }

    #[tokio::test]
    async fn due_tasks_are_popped_and_marked_running() {
        let db = DB_MANAGER.tasks_db();
        let mut task = meta("queue-a");
        task.next_run = utc_now!() - 1000;
        let task_id = task.id;
        NativeDbTaskStore::store_one(db, task).await.unwrap();

        let _ = NativeDbTaskStore::fetch_pending_tasks(db).await.unwrap();
        let stored = NativeDbTaskStore::get(db, task_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Running);

        // already Running, so a second poll skips it
        let pending = NativeDbTaskStore::fetch_pending_tasks(db).await.unwrap();
        assert!(!pending.iter().any(|t| t.id == task_id));
    }

    #[tokio::test]
    async fn future_tasks_stay_queued() {
        let db = DB_MANAGER.tasks_db();
        let mut task = meta("queue-b");
        task.next_run = utc_now!() + 60_000;
        let task_id = task.id;
        NativeDbTaskStore::store_one(db, task).await.unwrap();

        let pending = NativeDbTaskStore::fetch_pending_tasks(db).await.unwrap();
        assert!(!pending.iter().any(|t| t.id == task_id));
    }

    #[tokio::test]
    async fn failure_with_deadline_requeues_and_without_dead_letters() {
        let db = DB_MANAGER.tasks_db();
        let mut task = meta("queue-c");
        task.next_run = utc_now!() - 1000;
        let task_id = task.id;
        NativeDbTaskStore::store_one(db, task).await.unwrap();
        let _ = NativeDbTaskStore::fetch_pending_tasks(db).await.unwrap();

        // transient failure: retried later
        NativeDbTaskStore::update_status(
            db,
            task_id,
            false,
            Some("boom".into()),
            Some(10),
            Some(1),
            Some(utc_now!() + 5_000),
        )
        .await
        .unwrap();
        let stored = NativeDbTaskStore::get(db, task_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert_eq!(stored.retry_count, Some(1));

        // terminal failure: dead-lettered
        NativeDbTaskStore::update_status(
            db,
            task_id,
            false,
            Some("boom again".into()),
            Some(10),
            Some(3),
            None,
        )
        .await
        .unwrap();
        let stored = NativeDbTaskStore::get(db, task_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Dead);
    }
}
