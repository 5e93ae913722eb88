// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use tracing::{info, warn};

use crate::modules::account::entity::{MailAccount, MailAccountAuth};
use crate::modules::error::MailStashResult;

pub mod folders;
pub mod graph;
pub mod imap;
pub mod task;
pub mod tick;

/// What one sync attempt accomplished. Per-folder failures are collected
/// rather than aborting sibling folders.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub emails_synced: usize,
    pub folders_synced: Vec<String>,
    pub folder_failures: Vec<(String, String)>,
}

impl SyncOutcome {
    pub fn record_success(&mut self, folder: &str, synced: usize) {
        self.emails_synced += synced;
        self.folders_synced.push(folder.to_string());
    }

    pub fn record_failure(&mut self, folder: &str, error: String) {
        warn!(folder, %error, "folder sync failed; continuing with siblings");
        self.folder_failures.push((folder.to_string(), error));
    }
}

/// Full sync: folder discovery, then a delta pass over every eligible folder.
pub async fn run_initial_sync(account_id: u64) -> MailStashResult<()> {
    let account = MailAccount::check_account_active(account_id).await?;
    let outcome = match account.auth {
        MailAccountAuth::AppPassword => imap::sync_account(&account, true, None).await?,
        MailAccountAuth::OAuth2 => graph::sync_account(&account, None).await?,
    };
    info!(
        account_id,
        email = %account.email,
        emails = outcome.emails_synced,
        folders = outcome.folders_synced.len(),
        failures = outcome.folder_failures.len(),
        "initial sync finished"
    );
    Ok(())
}

/// Incremental sync over the previously synced folder set only; no
/// rediscovery of new folders, which bounds work under scheduled ticks.
pub async fn run_incremental_sync(account_id: u64, folders: Vec<String>) -> MailStashResult<()> {
    let account = MailAccount::check_account_active(account_id).await?;
    let outcome = match account.auth {
        MailAccountAuth::AppPassword => {
            imap::sync_account(&account, false, Some(folders)).await?
        }
        MailAccountAuth::OAuth2 => graph::sync_account(&account, Some(folders)).await?,
    };
    info!(
        account_id,
        email = %account.email,
        emails = outcome.emails_synced,
        folders = outcome.folders_synced.len(),
        failures = outcome.folder_failures.len(),
        "incremental sync finished"
    );
    Ok(())
}
