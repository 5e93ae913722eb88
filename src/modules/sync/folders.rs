// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use std::sync::Arc;

use crate::modules::account::entity::MailAccount;
use crate::modules::error::MailStashResult;
use crate::modules::folder::{
    normalize_folder, should_sync_folder, sort_by_priority, FolderDescriptor,
};
use crate::modules::imap::executor::ImapExecutor;

/// LIST all mailboxes, normalize, drop non-mail folders, order by priority.
pub async fn discover_imap_folders(
    account: &MailAccount,
    executor: &Arc<ImapExecutor>,
) -> MailStashResult<Vec<(FolderDescriptor, String)>> {
    let names = executor.list_all_folders().await?;
    let mut folders: Vec<(FolderDescriptor, String)> = names
        .iter()
        .map(|name| {
            let descriptor = FolderDescriptor::from_imap_name(name, account.provider);
            let canonical = normalize_folder(&descriptor);
            (descriptor, canonical)
        })
        .filter(|(descriptor, canonical)| should_sync_folder(&descriptor.path, canonical))
        .collect();
    sort_by_priority(&mut folders);
    Ok(folders)
}

/// Maps the previously synced canonical set back onto live folder paths with
/// a single LIST. Folders that vanished upstream are silently dropped.
pub async fn resolve_imap_folders(
    account: &MailAccount,
    executor: &Arc<ImapExecutor>,
    canonical_set: &[String],
) -> MailStashResult<Vec<(FolderDescriptor, String)>> {
    let mut folders = discover_imap_folders(account, executor).await?;
    folders.retain(|(_, canonical)| canonical_set.contains(canonical));
    Ok(folders)
}
