// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use crate::modules::context::Initialize;
use crate::modules::error::code::ErrorCode;
use crate::raise_error;
use crate::{
    modules::{
        error::MailStashResult,
        imap::{executor::ImapExecutor, manager::build_imap_pool},
    },
    utc_now,
};
use dashmap::DashMap;
use std::sync::{Arc, LazyLock};
use tracing::info;

pub static MAIL_CONTEXT: LazyLock<MailClientExecutors> = LazyLock::new(MailClientExecutors::new);

/// Per-account IMAP executor cache. Pools are built lazily on first use and
/// evicted when the account is removed.
pub struct MailClientExecutors {
    start_at: i64,
    imap: DashMap<u64, Arc<ImapExecutor>>,
}

impl Initialize for MailClientExecutors {
    async fn initialize() -> MailStashResult<()> {
        let _ = MAIL_CONTEXT.uptime_ms();
        Ok(())
    }
}

impl MailClientExecutors {
    pub fn new() -> Self {
        Self {
            start_at: utc_now!(),
            imap: DashMap::new(),
        }
    }

    pub fn uptime_ms(&self) -> i64 {
        utc_now!() - self.start_at
    }

    pub async fn imap(&self, account_id: u64) -> MailStashResult<Arc<ImapExecutor>> {
        if let Some(executor) = self.imap.get(&account_id) {
            return Ok(executor.value().clone());
        }

        let pool = build_imap_pool(account_id).await?;
        let new_executor = Arc::new(ImapExecutor::new(pool));

        match self.imap.try_entry(account_id) {
            Some(dashmap::mapref::entry::Entry::Occupied(entry)) => Ok(entry.get().clone()),
            Some(dashmap::mapref::entry::Entry::Vacant(entry)) => {
                entry.insert(new_executor.clone());
                Ok(new_executor)
            }
            None => Err(raise_error!(
                "DashMap locked".into(),
                ErrorCode::InternalError
            )),
        }
    }

    pub async fn clean_account(&self, account_id: u64) -> MailStashResult<()> {
        if self.imap.remove(&account_id).is_some() {
            info!(account_id, "Closed IMAP pool for account");
        }
        Ok(())
    }
}
