// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use std::sync::Arc;

use tracing::{debug, warn};

use crate::modules::account::entity::MailAccount;
use crate::modules::context::executors::MAIL_CONTEXT;
use crate::modules::error::MailStashResult;
use crate::modules::imap::executor::ImapExecutor;
use crate::modules::mirror::entity::{FolderUidState, MessageRecord};
use crate::modules::parser::imap::parse_imap_message;
use crate::modules::sync::folders::{discover_imap_folders, resolve_imap_folders};
use crate::modules::sync::task::enqueue_attachment_uploads;
use crate::modules::sync::SyncOutcome;

/// Delta-sync chunking: newest-first UID windows per fetch round trip.
const CHUNK_SIZE: usize = 50;
const INITIAL_CHUNK_SIZE: usize = 100;

/// One sync attempt for one IMAP account. A credential failure aborts the
/// whole job (no folder can succeed without a session); anything scoped to a
/// single folder is isolated.
pub async fn sync_account(
    account: &MailAccount,
    initial: bool,
    folders: Option<Vec<String>>,
) -> MailStashResult<SyncOutcome> {
    let executor = MAIL_CONTEXT.imap(account.id).await?;

    let targets = match &folders {
        None => discover_imap_folders(account, &executor).await?,
        Some(canonical_set) => resolve_imap_folders(account, &executor, canonical_set).await?,
    };

    let chunk_size = if initial { INITIAL_CHUNK_SIZE } else { CHUNK_SIZE };
    let mut outcome = SyncOutcome::default();

    for (descriptor, canonical) in targets {
        match sync_folder(account, &executor, &descriptor.path, &canonical, chunk_size).await {
            Ok((synced, folder_highest)) => {
                MailAccount::record_sync_progress(
                    account.id,
                    Some(canonical.clone()),
                    folder_highest,
                )
                .await?;
                outcome.record_success(&canonical, synced);
            }
            Err(error) => {
                if !error.code().retryable() {
                    // credentials are account-wide; abort instead of burning
                    // the remaining folders against a rejecting server
                    return Err(error);
                }
                outcome.record_failure(&canonical, error.to_string());
            }
        }
    }

    Ok(outcome)
}

/// The per-folder delta loop: UID watermark from the mirror, server-side UID
/// enumeration, newest-first chunks, tombstone-aware duplicate skip, batch
/// insert. Returns `(messages_synced, folder_highest_uid)`.
async fn sync_folder(
    account: &MailAccount,
    executor: &Arc<ImapExecutor>,
    raw_path: &str,
    canonical: &str,
    chunk_size: usize,
) -> MailStashResult<(usize, u32)> {
    let status = executor.folder_status(raw_path).await?;

    let mut watermark_reset = false;
    if let Some(uid_validity) = status.uid_validity {
        if FolderUidState::observe(account.id, canonical, uid_validity).await? {
            warn!(
                account_id = account.id,
                folder = canonical,
                uid_validity,
                "UIDVALIDITY changed; resetting folder watermark"
            );
            watermark_reset = true;
        }
    }

    let last_uid = if watermark_reset {
        0
    } else {
        MessageRecord::highest_uid(account.id, canonical).await?
    };
    let start_uid = last_uid + 1;
    let highest_uid = status.highest_uid()?;

    if highest_uid < start_uid {
        debug!(
            folder = canonical,
            highest_uid, start_uid, "folder is already up to date"
        );
        return Ok((0, last_uid));
    }

    // UIDs actually present; Trash/Spam folders are sparse after expunges
    let mut uids = executor.search_uids_from_start(raw_path, start_uid).await?;
    if uids.is_empty() {
        return Ok((0, highest_uid));
    }
    // newest first, so partial progress under a crash covers the most
    // recent messages
    uids.sort_unstable_by(|a, b| b.cmp(a));

    let mut total_synced = 0usize;
    let mut parse_failures = 0usize;

    for chunk in uids.chunks(chunk_size) {
        let chunk_high = *chunk.first().expect("chunks are non-empty");
        let chunk_low = *chunk.last().expect("chunks are non-empty");
        let fetches = executor
            .fetch_uid_range(raw_path, chunk_low, chunk_high)
            .await?;

        let mut records = Vec::new();
        // oldest-in-chunk first, so the mirror fills bottom-up within a chunk
        for fetch in fetches.iter().rev() {
            let Some(uid) = fetch.uid else { continue };
            if !chunk.contains(&uid) {
                continue;
            }
            if MessageRecord::exists_by_uid_folder_account(uid, canonical, account.id).await? {
                continue;
            }
            match parse_imap_message(fetch) {
                Ok(parsed) => {
                    let attachments = parsed.attachments.clone();
                    let record = MessageRecord::from_parsed(account.id, canonical, uid, parsed);
                    enqueue_attachment_uploads(record.id, account.id, attachments).await;
                    records.push(record);
                }
                Err(error) => {
                    // one malformed message never takes down its chunk
                    parse_failures += 1;
                    warn!(
                        account_id = account.id,
                        folder = canonical,
                        uid,
                        %error,
                        "skipping unparseable message"
                    );
                }
            }
        }
        total_synced += MessageRecord::insert_batch(records).await?;
    }

    if parse_failures > 0 {
        warn!(
            account_id = account.id,
            folder = canonical,
            parse_failures,
            "some messages were skipped during sync"
        );
    }

    Ok((total_synced, highest_uid))
}
