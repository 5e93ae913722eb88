use crate::modules::common::log::GovRateLimiter;
use crate::modules::scheduler::cleaner::TaskCleaner;
use crate::modules::scheduler::flow::TaskFlow;
use crate::modules::scheduler::handlers::TaskHandlers;
use crate::modules::scheduler::store::TaskStore;
use crate::modules::scheduler::task::Task;
use crate::modules::scheduler::updater::TaskStatusUpdater;
use crate::utc_now;
use dashmap::DashMap;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_QUEUE_CONCURRENCY: usize = 2;

#[derive(Clone)]
pub struct QueueOptions {
    /// Jobs of this queue running concurrently in one worker process.
    pub concurrency: usize,
    /// Optional dispatch cap, jobs per minute.
    pub rate_limiter: Option<Arc<GovRateLimiter>>,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_QUEUE_CONCURRENCY,
            rate_limiter: None,
        }
    }
}

pub struct TaskContext<S>
where
    S: TaskStore + Send + Sync + Clone + 'static,
{
    queue_options: DashMap<String, QueueOptions>,
    handlers: TaskHandlers,
    store: Arc<S>,
}

impl<S> TaskContext<S>
where
    S: TaskStore + Send + Sync + Clone + 'static,
{
    pub fn with_arc_store(store: Arc<S>) -> Self {
        Self {
            queue_options: DashMap::new(),
            handlers: TaskHandlers::new(),
            store,
        }
    }

    /// Registers a task type and creates its queue with default options.
    pub fn register<T>(mut self) -> Self
    where
        T: Task,
    {
        self.handlers.register::<T>();
        self.queue_options
            .entry(T::TASK_QUEUE.to_owned())
            .or_default();
        self
    }

    pub fn set_concurrency(self, queue: &str, count: usize) -> Self {
        self.queue_options
            .entry(queue.to_owned())
            .or_default()
            .concurrency = count;
        self
    }

    /// Caps dispatch of a queue at `jobs_per_minute`.
    pub fn set_rate_limit(self, queue: &str, jobs_per_minute: u32) -> Self {
        let quota = Quota::per_minute(
            NonZeroU32::new(jobs_per_minute).expect("rate limit must be greater than 0"),
        );
        self.queue_options
            .entry(queue.to_owned())
            .or_default()
            .rate_limiter = Some(Arc::new(RateLimiter::direct(quota)));
        self
    }

    fn start_task_cleaner(&self) {
        let cleaner = TaskCleaner::new(self.store.clone());
        cleaner.start(Duration::from_secs(60 * 10));
    }

    async fn start_flow(&self) {
        let status_updater = Arc::new(TaskStatusUpdater::new(
            self.store.clone(),
            self.queue_options.len(),
        ));

        let flow = Arc::new(TaskFlow::new(
            self.store.clone(),
            &self.queue_options,
            Arc::new(self.handlers.clone()),
            status_updater,
        ));

        flow.start().await;
    }

    /// Runs the task context: workers plus the retention cleaner.
    pub async fn start_with_cleaner(self) -> Self {
        self.start_flow().await;
        self.start_task_cleaner();
        self
    }

    pub async fn add_task<T>(&self, task: T, delay_seconds: Option<u32>) -> Result<(), String>
    where
        T: Task + Send + Sync + 'static,
    {
        let mut task_meta = task.new_meta();
        let delay_ms = delay_seconds.unwrap_or(task_meta.delay_seconds) * 1000;
        task_meta.next_run = utc_now!() + delay_ms as i64;
        self.store
            .store_task(task_meta)
            .await
            .map_err(|e| format!("{:#?}", e))
    }

    pub async fn add_tasks<T>(&self, tasks: &[T], delay_seconds: Option<u32>) -> Result<(), String>
    where
        T: Task + Send + Sync + 'static,
    {
        let task_metas = tasks
            .iter()
            .map(|t| {
                let mut task_meta = t.new_meta();
                let delay_ms = delay_seconds.unwrap_or(task_meta.delay_seconds) * 1000;
                task_meta.next_run = utc_now!() + delay_ms as i64;
                task_meta
            })
            .collect::<Vec<_>>();

        self.store
            .store_tasks(task_metas)
            .await
            .map_err(|e| format!("Failed to store tasks: {e:#?}"))
    }
}
