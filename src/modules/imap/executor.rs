// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use crate::encode_mailbox_name;
use crate::modules::error::code::ErrorCode;
use crate::modules::{error::MailStashResult, imap::manager::ImapConnectionManager};
use crate::raise_error;
use async_imap::types::{Fetch, Name};
use bb8::Pool;
use futures::TryStreamExt;

/// Query used by the delta loop: everything needed to build a mirror row in
/// one round trip.
const FULL_MESSAGE_QUERY: &str = "(UID FLAGS INTERNALDATE BODY.PEEK[])";

/// Post-EXAMINE view of a single folder.
#[derive(Debug, Clone, Copy)]
pub struct FolderStatus {
    pub exists: u32,
    pub uid_next: Option<u32>,
    pub uid_validity: Option<u32>,
}

impl FolderStatus {
    /// UIDNEXT − 1, or 0 for an empty folder.
    pub fn highest_uid(&self) -> MailStashResult<u32> {
        if self.exists == 0 {
            return Ok(0);
        }
        let uid_next = self.uid_next.ok_or_else(|| {
            raise_error!(
                "Server did not report UIDNEXT for a non-empty folder".into(),
                ErrorCode::ImapUnexpectedResult
            )
        })?;
        Ok(uid_next.saturating_sub(1))
    }
}

pub struct ImapExecutor {
    pool: Pool<ImapConnectionManager>,
}

impl ImapExecutor {
    pub fn new(pool: Pool<ImapConnectionManager>) -> Self {
        Self { pool }
    }

    pub async fn list_all_folders(&self) -> MailStashResult<Vec<Name>> {
        let mut session = self.pool.get().await?;
        let list = session
            .list(Some(""), Some("*"))
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?;
        let result = list
            .try_collect::<Vec<Name>>()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?;
        Ok(result)
    }

    /// LIST scoped to a single folder; used by the normalizer to pick up
    /// special-use hints and flags.
    pub async fn folder_metadata(&self, folder: &str) -> MailStashResult<Option<Name>> {
        let encoded = encode_mailbox_name!(folder);
        let mut session = self.pool.get().await?;
        let list = session
            .list(Some(""), Some(&encoded))
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?;
        let mut result = list
            .try_collect::<Vec<Name>>()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?;
        Ok(if result.is_empty() {
            None
        } else {
            Some(result.swap_remove(0))
        })
    }

    pub async fn folder_status(&self, folder: &str) -> MailStashResult<FolderStatus> {
        let encoded = encode_mailbox_name!(folder);
        let mut session = self.pool.get().await?;
        let mailbox = session
            .examine(&encoded)
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?;
        Ok(FolderStatus {
            exists: mailbox.exists,
            uid_next: mailbox.uid_next,
            uid_validity: mailbox.uid_validity,
        })
    }

    /// UIDs ≥ `start_uid` actually present on the server. Sparse folders
    /// (Trash/Spam with expunged ranges) come back with holes; the `n:*`
    /// search quirk of returning the last message when `n` exceeds it is
    /// filtered out here.
    pub async fn search_uids_from_start(
        &self,
        folder: &str,
        start_uid: u32,
    ) -> MailStashResult<Vec<u32>> {
        assert!(start_uid > 0, "start_uid must be greater than 0");
        let encoded = encode_mailbox_name!(folder);
        let mut session = self.pool.get().await?;
        session
            .examine(&encoded)
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?;
        let uids = session
            .uid_search(format!("UID {}:*", start_uid))
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?;
        Ok(uids.into_iter().filter(|uid| *uid >= start_uid).collect())
    }

    /// Fetches `[uid_low, uid_high]` with flags, internal date and the raw
    /// RFC 5322 source. The pooled session is returned on every exit path.
    pub async fn fetch_uid_range(
        &self,
        folder: &str,
        uid_low: u32,
        uid_high: u32,
    ) -> MailStashResult<Vec<Fetch>> {
        assert!(uid_low > 0 && uid_low <= uid_high, "invalid uid range");
        let encoded = encode_mailbox_name!(folder);
        let uid_set = format!("{}:{}", uid_low, uid_high);
        let mut session = self.pool.get().await?;
        session
            .examine(&encoded)
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?;
        let list = session
            .uid_fetch(uid_set.as_str(), FULL_MESSAGE_QUERY)
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?;
        let result = list
            .try_collect::<Vec<Fetch>>()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?;
        Ok(result)
    }
}
