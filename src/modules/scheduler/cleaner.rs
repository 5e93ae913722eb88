use crate::modules::common::signal::SIGNAL_MANAGER;
use crate::modules::scheduler::store::TaskStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Periodically applies the retention policy to terminal task rows.
pub struct TaskCleaner<T>
where
    T: TaskStore + Send + Sync + Clone + 'static,
{
    store: Arc<T>,
}

impl<T> TaskCleaner<T>
where
    T: TaskStore + Send + Sync + Clone + 'static,
{
    pub fn new(store: Arc<T>) -> Self {
        Self { store }
    }

    pub fn start(self, interval: Duration) {
        let store = self.store.clone();
        tokio::spawn(async move {
            let mut shutdown = SIGNAL_MANAGER.subscribe();
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // discard the immediate first tick
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = store.cleanup().await {
                            warn!("Task cleanup failed: {:?}", e);
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("Task cleaner shutting down.");
                        break;
                    }
                }
            }
        });
    }
}
