// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use chrono::{SecondsFormat, TimeZone, Utc};
use tracing::debug;

use crate::modules::account::entity::MailAccount;
use crate::modules::account::provider::Provider;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailStashResult;
use crate::modules::folder::{
    folder_priority, normalize_folder, should_sync_folder, FolderDescriptor,
};
use crate::modules::graph::client::GraphClient;
use crate::modules::graph::model::MailFolder;
use crate::modules::mirror::entity::MessageRecord;
use crate::modules::oauth2::refresh::refresh_microsoft_token;
use crate::modules::oauth2::tokens::GraphTokens;
use crate::modules::parser::graph::parse_graph_message;
use crate::modules::sync::task::enqueue_attachment_uploads;
use crate::modules::sync::SyncOutcome;
use crate::raise_error;

/// One sync attempt for one Graph account. The stored refresh token is
/// exchanged and the rotated pair persisted before any mailbox read.
pub async fn sync_account(
    account: &MailAccount,
    folders: Option<Vec<String>>,
) -> MailStashResult<SyncOutcome> {
    rotate_tokens(account).await?;

    let listing = GraphClient::list_mail_folders(account.id).await?;
    let mut targets: Vec<(MailFolder, String)> = listing
        .into_iter()
        .map(|folder| {
            let descriptor = FolderDescriptor::new(folder.display_name.clone(), Provider::Outlook);
            let canonical = normalize_folder(&descriptor);
            (folder, canonical)
        })
        .filter(|(folder, canonical)| should_sync_folder(&folder.display_name, canonical))
        .collect();
    for (folder, canonical) in &targets {
        GraphClient::cache_folder_id(account.id, canonical, &folder.id);
    }
    if let Some(canonical_set) = &folders {
        targets.retain(|(_, canonical)| canonical_set.contains(canonical));
    }
    let mut prioritized: Vec<String> = targets
        .iter()
        .map(|(_, canonical)| canonical.clone())
        .collect();
    prioritized.sort_by(|a, b| folder_priority(b).cmp(&folder_priority(a)));

    let since = watermark_filter(account);
    let mut outcome = SyncOutcome::default();

    for canonical in prioritized {
        let folder_id = match GraphClient::cached_folder_id(account.id, &canonical) {
            Some(id) => id,
            None => {
                outcome.record_failure(&canonical, "folder id missing from listing".into());
                continue;
            }
        };
        match sync_folder(account, &folder_id, &canonical, &since).await {
            Ok((synced, highest)) => {
                MailAccount::record_sync_progress(account.id, Some(canonical.clone()), highest)
                    .await?;
                outcome.record_success(&canonical, synced);
            }
            Err(error) => {
                if !error.code().retryable() {
                    return Err(error);
                }
                outcome.record_failure(&canonical, error.to_string());
            }
        }
    }

    Ok(outcome)
}

/// Exchange-then-persist: the rotated refresh token hits the store before the
/// fresh access token is used for any Graph read, so a crash mid-sync cannot
/// strand the account on a consumed grant.
async fn rotate_tokens(account: &MailAccount) -> MailStashResult<()> {
    let tokens = GraphTokens::get(account.id).await?.ok_or_else(|| {
        raise_error!(
            format!("Account {} has no stored Graph tokens", account.id),
            ErrorCode::MissingRefreshToken
        )
    })?;
    let refresh_token = tokens.refresh_token.ok_or_else(|| {
        raise_error!(
            format!("Account {} has no refresh token", account.id),
            ErrorCode::MissingRefreshToken
        )
    })?;

    let refreshed = refresh_microsoft_token(&refresh_token).await?;
    let next_refresh = refreshed
        .refresh_token
        .unwrap_or_else(|| refresh_token.clone());
    GraphTokens::rotate(account.id, refreshed.access_token, next_refresh).await
}

/// Time filter for the delta query: the last successful sync instant, or the
/// epoch for a first run.
fn watermark_filter(account: &MailAccount) -> String {
    let millis = account.last_synced_at.unwrap_or(0);
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Graph has no native UID; each new message gets a locally assigned one,
/// monotonically above everything the mirror has seen for this account. The
/// `(account, uid, folder)` identity contract is shared with the IMAP path.
async fn sync_folder(
    account: &MailAccount,
    folder_id: &str,
    canonical: &str,
    since: &str,
) -> MailStashResult<(usize, u32)> {
    let messages = GraphClient::list_messages_since(account.id, folder_id, since).await?;
    if messages.is_empty() {
        return Ok((0, account.last_fetched_uid));
    }

    let base = account
        .last_fetched_uid
        .max(MessageRecord::max_uid_any_folder(account.id).await?);
    let mut next_uid = base;

    let mut records = Vec::new();
    // the listing is newest-first; persist oldest-first so synthetic UIDs
    // grow in arrival order
    for message in messages.iter().rev() {
        let parsed = parse_graph_message(message);
        // the time filter re-reads the boundary instant; replays are absorbed
        // by the upstream message id, not the (always fresh) synthetic UID
        if let Some(message_id) = &parsed.message_id {
            if MessageRecord::exists_message_id(account.id, canonical, message_id).await? {
                continue;
            }
        }
        next_uid += 1;
        let attachments = parsed.attachments.clone();
        let record = MessageRecord::from_parsed(account.id, canonical, next_uid, parsed);
        enqueue_attachment_uploads(record.id, account.id, attachments).await;
        records.push(record);
    }

    debug!(
        account_id = account.id,
        folder = canonical,
        fetched = messages.len(),
        fresh = records.len(),
        "graph delta pass"
    );

    let synced = MessageRecord::insert_batch(records).await?;
    Ok((synced, next_uid))
}
