// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use std::time::Duration;

use tracing::{debug, warn};

use crate::modules::account::entity::MailAccount;
use crate::modules::context::MailStashTask;
use crate::modules::scheduler::periodic::PeriodicTask;
use crate::modules::settings::cli::SETTINGS;
use crate::modules::sync::task::IncrementalSyncTask;
use crate::modules::tasks::queue::MailStashTaskQueue;

/// Periodic tick that keeps every onboarded account fresh: one incremental
/// job per enabled account, staler accounts first. Accounts still waiting on
/// their initial sync (empty synced folder set) are skipped.
pub struct SyncSchedulerTask;

impl MailStashTask for SyncSchedulerTask {
    fn start() {
        let periodic_task = PeriodicTask::new("incremental-sync-scheduler");

        let task = move |_: Option<u64>| {
            Box::pin(async move {
                let mut accounts: Vec<MailAccount> = MailAccount::list_all()
                    .await?
                    .into_iter()
                    .filter(|account| account.enabled)
                    .collect();
                accounts.sort_by_key(|account| account.last_synced_at.unwrap_or(0));

                if accounts.is_empty() {
                    debug!("no active accounts to schedule");
                    return Ok(());
                }

                let queue = MailStashTaskQueue::get()?;
                for account in accounts {
                    if account.synced_folders.is_empty() {
                        debug!(
                            account_id = account.id,
                            "initial sync has not completed; skipping tick"
                        );
                        continue;
                    }
                    let task = IncrementalSyncTask {
                        account_id: account.id,
                        email: account.email.clone(),
                        folders: account.synced_folders.iter().cloned().collect(),
                    };
                    if let Err(error) = queue.submit_task(task, None).await {
                        warn!(
                            account_id = account.id,
                            %error,
                            "failed to enqueue incremental sync"
                        );
                    }
                }
                Ok(())
            })
        };

        periodic_task.start(
            task,
            None,
            Duration::from_secs(SETTINGS.mailstash_sync_tick_secs),
            false,
            false,
        );
    }
}
