// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use itertools::Itertools;
use native_db::*;
use native_model::{native_model, Model};
use poem_openapi::Object;
use serde::{Deserialize, Serialize};

use crate::modules::database::{
    batch_delete_impl, filter_by_secondary_key_impl, manager::DB_MANAGER, secondary_find_impl,
    update_impl,
};
use crate::modules::error::{code::ErrorCode, MailStashResult};
use crate::modules::mirror::fts::FtsEntry;
use crate::modules::parser::ParsedMail;
use crate::modules::utils::message_record_id;
use crate::{raise_error, utc_now};

/// One mirrored message. The primary key encodes the `(account, folder, uid)`
/// triple, so replayed inserts collide instead of duplicating rows.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, Object)]
#[native_model(id = 20, version = 1)]
#[native_db(primary_key(pk -> String), secondary_key(account_folder -> String))]
pub struct MessageRecord {
    /// Stable 64-bit id derived from the unique triple
    #[secondary_key(unique)]
    pub id: u64,
    #[secondary_key]
    pub account_id: u64,
    /// Per-folder IMAP UID, or a locally assigned synthetic UID for Graph
    pub uid: u32,
    /// Canonical folder name
    pub folder: String,
    /// Upstream Message-ID / internetMessageId; opaque, nullable
    pub message_id: Option<String>,
    #[serde(rename = "from")]
    #[oai(rename = "from")]
    pub from_addr: String,
    #[serde(rename = "to")]
    #[oai(rename = "to")]
    pub to_addrs: Vec<String>,
    pub subject: String,
    pub body: String,
    pub html_body: Option<String>,
    pub is_read: bool,
    pub received_at: i64,
    pub fetched_at: i64,
    /// Soft-delete tombstone; never cleared by sync
    pub deleted_at: Option<i64>,
    pub created_at: i64,
}

impl MessageRecord {
    fn pk(&self) -> String {
        Self::primary_key(self.account_id, &self.folder, self.uid)
    }

    fn account_folder(&self) -> String {
        Self::folder_scan_key(self.account_id, &self.folder)
    }

    pub fn primary_key(account_id: u64, folder: &str, uid: u32) -> String {
        format!("{}_{}_{:010}", account_id, folder, uid)
    }

    pub fn folder_scan_key(account_id: u64, folder: &str) -> String {
        format!("{}_{}", account_id, folder)
    }

    pub fn from_parsed(account_id: u64, folder: &str, uid: u32, parsed: ParsedMail) -> Self {
        let now = utc_now!();
        MessageRecord {
            id: message_record_id(account_id, folder, uid),
            account_id,
            uid,
            folder: folder.to_string(),
            message_id: parsed.message_id,
            from_addr: parsed.from,
            to_addrs: parsed.to,
            subject: parsed.subject,
            body: parsed.body,
            html_body: parsed.html_body,
            is_read: parsed.is_read,
            received_at: parsed.received_at,
            fetched_at: now,
            deleted_at: None,
            created_at: now,
        }
    }

    /// Duplicate check over all rows, tombstones included, so a resync never
    /// resurrects a deleted message.
    pub async fn exists_by_uid_folder_account(
        uid: u32,
        folder: &str,
        account_id: u64,
    ) -> MailStashResult<bool> {
        let key = Self::primary_key(account_id, folder, uid);
        let found: Option<MessageRecord> =
            crate::modules::database::async_find_impl(DB_MANAGER.mirror_db(), key).await?;
        Ok(found.is_some())
    }

    /// MAX(uid) over live rows for the pair, or 0. This is the per-folder
    /// sync watermark.
    pub async fn highest_uid(account_id: u64, folder: &str) -> MailStashResult<u32> {
        let folder = folder.to_string();
        let scan_key = Self::folder_scan_key(account_id, &folder);
        let rows: Vec<MessageRecord> = filter_by_secondary_key_impl(
            DB_MANAGER.mirror_db(),
            MessageRecordKey::account_folder,
            scan_key,
        )
        .await?;
        Ok(rows
            .into_iter()
            .filter(|r| r.folder == folder && r.deleted_at.is_none())
            .map(|r| r.uid)
            .max()
            .unwrap_or(0))
    }

    /// Whether the folder already mirrors a message with this upstream id.
    /// Synthetic-UID providers replay the watermark boundary; this is their
    /// duplicate check.
    pub async fn exists_message_id(
        account_id: u64,
        folder: &str,
        message_id: &str,
    ) -> MailStashResult<bool> {
        let folder = folder.to_string();
        let scan_key = Self::folder_scan_key(account_id, &folder);
        let rows: Vec<MessageRecord> = filter_by_secondary_key_impl(
            DB_MANAGER.mirror_db(),
            MessageRecordKey::account_folder,
            scan_key,
        )
        .await?;
        Ok(rows
            .into_iter()
            .any(|r| r.folder == folder && r.message_id.as_deref() == Some(message_id)))
    }

    /// MAX(uid) across every row of the account, tombstones included. Feeds
    /// the synthetic UID allocator for Graph batches.
    pub async fn max_uid_any_folder(account_id: u64) -> MailStashResult<u32> {
        let rows: Vec<MessageRecord> = filter_by_secondary_key_impl(
            DB_MANAGER.mirror_db(),
            MessageRecordKey::account_id,
            account_id,
        )
        .await?;
        Ok(rows.into_iter().map(|r| r.uid).max().unwrap_or(0))
    }

    /// Batch insert with at-least-once semantics: rows whose triple already
    /// exists are skipped silently. FTS entries are upserted for the rows
    /// actually written, in the same transaction.
    pub async fn insert_batch(records: Vec<MessageRecord>) -> MailStashResult<usize> {
        let db = DB_MANAGER.mirror_db().clone();
        tokio::task::spawn_blocking(move || {
            let rw = db
                .rw_transaction()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            let mut inserted = 0usize;
            for record in records {
                let fts = FtsEntry::from_message(&record);
                match rw.insert(record) {
                    Ok(()) => {
                        rw.upsert(fts).map_err(|e| {
                            raise_error!(format!("{:#?}", e), ErrorCode::InternalError)
                        })?;
                        inserted += 1;
                    }
                    Err(db_type::Error::DuplicateKey { .. }) => continue,
                    Err(e) => {
                        return Err(raise_error!(format!("{:#?}", e), ErrorCode::InternalError));
                    }
                }
            }
            rw.commit()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            Ok(inserted)
        })
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
    }

    pub async fn find(message_id: u64) -> MailStashResult<Option<MessageRecord>> {
        secondary_find_impl(DB_MANAGER.mirror_db(), MessageRecordKey::id, message_id).await
    }

    pub async fn get(message_id: u64) -> MailStashResult<MessageRecord> {
        Self::find(message_id).await?.ok_or_else(|| {
            raise_error!(
                format!("Message with id '{message_id}' not found"),
                ErrorCode::ResourceNotFound
            )
        })
    }

    pub async fn set_read_status(message_id: u64, is_read: bool) -> MailStashResult<()> {
        let previous = update_impl(
            DB_MANAGER.mirror_db(),
            move |rw| {
                rw.get()
                    .secondary::<MessageRecord>(MessageRecordKey::id, message_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!("Message with id '{message_id}' not found"),
                            ErrorCode::ResourceNotFound
                        )
                    })
            },
            move |current| {
                let mut updated = current.clone();
                updated.is_read = is_read;
                Ok(updated)
            },
        )
        .await?;
        // the index follows every live-row update, not just inserts
        if previous.deleted_at.is_none() {
            let mut refreshed = previous.clone();
            refreshed.is_read = is_read;
            FtsEntry::upsert_for(&refreshed).await?;
        }
        Ok(())
    }

    /// Soft delete. The tombstone stays in the mirror so the triple can never
    /// be re-inserted by a later sync.
    pub async fn soft_delete(message_id: u64) -> MailStashResult<()> {
        update_impl(
            DB_MANAGER.mirror_db(),
            move |rw| {
                rw.get()
                    .secondary::<MessageRecord>(MessageRecordKey::id, message_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!("Message with id '{message_id}' not found"),
                            ErrorCode::ResourceNotFound
                        )
                    })
            },
            move |current| {
                let mut updated = current.clone();
                updated.deleted_at = Some(utc_now!());
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    /// Hard delete of every mirror row for an account, FTS rows cascading.
    pub async fn clean_account(account_id: u64) -> MailStashResult<usize> {
        let db = DB_MANAGER.mirror_db().clone();
        tokio::task::spawn_blocking(move || {
            let rw = db
                .rw_transaction()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            let rows: Vec<MessageRecord> = rw
                .scan()
                .secondary::<MessageRecord>(MessageRecordKey::account_id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .start_with(account_id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .try_collect()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            let removed = rows.len();
            for row in rows {
                let fts: Option<FtsEntry> = rw
                    .get()
                    .primary(row.id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
                if let Some(fts) = fts {
                    rw.remove(fts)
                        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
                }
                rw.remove(row)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            }
            rw.commit()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            Ok(removed)
        })
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
    }

    /// Live rows of one account, newest first. Query filters are applied by
    /// the API layer.
    pub async fn list_account(account_id: u64) -> MailStashResult<Vec<MessageRecord>> {
        let rows: Vec<MessageRecord> = filter_by_secondary_key_impl(
            DB_MANAGER.mirror_db(),
            MessageRecordKey::account_id,
            account_id,
        )
        .await?;
        Ok(rows
            .into_iter()
            .filter(|r| r.deleted_at.is_none())
            .sorted_by(|a, b| b.received_at.cmp(&a.received_at))
            .collect())
    }
}

/// Last-seen UIDVALIDITY per (account, folder). A generation change on the
/// server invalidates prior UIDs; the watermark is reset when that happens.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[native_model(id = 22, version = 1)]
#[native_db]
pub struct FolderUidState {
    #[primary_key]
    pub id: u64,
    #[secondary_key]
    pub account_id: u64,
    pub folder: String,
    pub uid_validity: u32,
    pub updated_at: i64,
}

impl FolderUidState {
    pub fn state_id(account_id: u64, folder: &str) -> u64 {
        message_record_id(account_id, folder, u32::MAX)
    }

    pub async fn find(account_id: u64, folder: &str) -> MailStashResult<Option<FolderUidState>> {
        crate::modules::database::async_find_impl(
            DB_MANAGER.mirror_db(),
            Self::state_id(account_id, folder),
        )
        .await
    }

    /// Records the current UIDVALIDITY. Returns true when a previously seen
    /// generation changed, i.e. the per-folder watermark must be discarded.
    pub async fn observe(
        account_id: u64,
        folder: &str,
        uid_validity: u32,
    ) -> MailStashResult<bool> {
        let previous = Self::find(account_id, folder).await?;
        let changed = matches!(&previous, Some(state) if state.uid_validity != uid_validity);
        let state = FolderUidState {
            id: Self::state_id(account_id, folder),
            account_id,
            folder: folder.to_string(),
            uid_validity,
            updated_at: utc_now!(),
        };
        crate::modules::database::upsert_impl(DB_MANAGER.mirror_db(), state).await?;
        Ok(changed)
    }

    pub async fn clean_account(account_id: u64) -> MailStashResult<()> {
        batch_delete_impl(DB_MANAGER.mirror_db(), move |rw| {
            let states: Vec<FolderUidState> = rw
                .scan()
                .secondary::<FolderUidState>(FolderUidStateKey::account_id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .start_with(account_id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .try_collect()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            Ok(states)
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::parser::ParsedMail;

    fn parsed(subject: &str) -> ParsedMail {
        ParsedMail {
            message_id: Some(format!("<{subject}@example.com>")),
            from: "\"A\" <a@example.com>".into(),
            to: vec!["b@example.com".into()],
            subject: subject.into(),
            body: "body text".into(),
            html_body: None,
            is_read: false,
            received_at: 1_700_000_000_000,
            attachments: vec![],
        }
    }

    #[tokio::test]
    async fn insert_is_idempotent_and_watermark_advances() {
        let account_id = 9001;
        let records: Vec<MessageRecord> = (101..=103)
            .map(|uid| MessageRecord::from_parsed(account_id, "INBOX", uid, parsed(&uid.to_string())))
            .collect();
        let inserted = MessageRecord::insert_batch(records.clone()).await.unwrap();
        assert_eq!(inserted, 3);
        assert_eq!(
            MessageRecord::highest_uid(account_id, "INBOX").await.unwrap(),
            103
        );

        // replaying the identical batch inserts nothing
        let replayed = MessageRecord::insert_batch(records).await.unwrap();
        assert_eq!(replayed, 0);
        assert_eq!(
            MessageRecord::highest_uid(account_id, "INBOX").await.unwrap(),
            103
        );
    }

    #[tokio::test]
    async fn tombstones_survive_resync_and_are_hidden_from_watermark() {
        let account_id = 9002;
        let record = MessageRecord::from_parsed(account_id, "INBOX", 102, parsed("victim"));
        let message_id = record.id;
        MessageRecord::insert_batch(vec![record.clone()]).await.unwrap();

        MessageRecord::soft_delete(message_id).await.unwrap();
        let tombstoned = MessageRecord::get(message_id).await.unwrap();
        assert!(tombstoned.deleted_at.is_some());

        // the triple still exists, so a resync skips it
        assert!(
            MessageRecord::exists_by_uid_folder_account(102, "INBOX", account_id)
                .await
                .unwrap()
        );
        // and a replayed insert does not resurrect it
        let replayed = MessageRecord::insert_batch(vec![record]).await.unwrap();
        assert_eq!(replayed, 0);
        let still = MessageRecord::get(message_id).await.unwrap();
        assert!(still.deleted_at.is_some());
        // tombstoned rows do not contribute to the watermark
        assert_eq!(
            MessageRecord::highest_uid(account_id, "INBOX").await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn synthetic_uid_base_covers_every_folder_and_tombstone() {
        let account_id = 9005;
        let inbox = MessageRecord::from_parsed(account_id, "INBOX", 50, parsed("a"));
        let sent = MessageRecord::from_parsed(account_id, "Sent", 200, parsed("b"));
        let sent_id = sent.id;
        MessageRecord::insert_batch(vec![inbox, sent]).await.unwrap();
        MessageRecord::soft_delete(sent_id).await.unwrap();

        // tombstones still reserve their uid range
        assert_eq!(MessageRecord::max_uid_any_folder(account_id).await.unwrap(), 200);
    }

    #[tokio::test]
    async fn uid_validity_change_is_detected() {
        let account_id = 9003;
        assert!(!FolderUidState::observe(account_id, "INBOX", 7).await.unwrap());
        assert!(!FolderUidState::observe(account_id, "INBOX", 7).await.unwrap());
        assert!(FolderUidState::observe(account_id, "INBOX", 8).await.unwrap());
    }

    #[tokio::test]
    async fn clean_account_cascades_to_fts() {
        let account_id = 9004;
        let record = MessageRecord::from_parsed(account_id, "INBOX", 1, parsed("gone"));
        let message_id = record.id;
        MessageRecord::insert_batch(vec![record]).await.unwrap();
        assert!(FtsEntry::find(message_id).await.unwrap().is_some());

        MessageRecord::clean_account(account_id).await.unwrap();
        assert!(MessageRecord::find(message_id).await.unwrap().is_none());
        assert!(FtsEntry::find(message_id).await.unwrap().is_none());
    }
}
