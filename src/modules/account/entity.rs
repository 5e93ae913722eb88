// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use native_db::*;
use native_model::{native_model, Model};
use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

use crate::{
    encrypt, id,
    modules::{
        account::provider::Provider,
        context::executors::MAIL_CONTEXT,
        database::{
            delete_impl, filter_by_secondary_key_impl, insert_impl, list_all_impl,
            manager::DB_MANAGER, secondary_find_impl, update_impl,
        },
        error::{code::ErrorCode, MailStashResult},
        graph::client::GraphClient,
        mirror::entity::{FolderUidState, MessageRecord},
        oauth2::tokens::GraphTokens,
    },
    raise_error, utc_now,
};

/// How the upstream mailbox is reached.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, Enum)]
pub enum MailAccountAuth {
    /// Per-app password over IMAP; the password lives in the vault.
    #[default]
    AppPassword,
    /// Microsoft Graph with a rotating OAuth2 token pair.
    OAuth2,
}

/// One linked upstream mailbox. `(user_id, email)` is unique.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, Object)]
#[native_model(id = 3, version = 1)]
#[native_db(primary_key(pk -> String), secondary_key(user_email -> String, unique))]
pub struct MailAccount {
    #[secondary_key(unique)]
    pub id: u64,
    #[secondary_key]
    pub user_id: u64,
    pub email: String,
    pub provider: Provider,
    pub auth: MailAccountAuth,
    /// Vault ciphertext of the app password; never exposed over the API
    #[oai(skip)]
    pub encrypted_password: Option<String>,
    pub enabled: bool,
    /// Canonical folders that have completed at least one sync
    pub synced_folders: BTreeSet<String>,
    /// Monotonically non-decreasing UID watermark across the account
    pub last_fetched_uid: u32,
    /// Wall-clock instant of the last successfully completed sync
    pub last_synced_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl MailAccount {
    fn pk(&self) -> String {
        format!("{}_{}", self.created_at, self.id)
    }

    fn user_email(&self) -> String {
        Self::user_email_key(self.user_id, &self.email)
    }

    pub fn user_email_key(user_id: u64, email: &str) -> String {
        format!("{}_{}", user_id, email.to_lowercase())
    }

    pub fn new_imap(user_id: u64, email: &str, app_password: &str) -> MailStashResult<Self> {
        Ok(Self {
            id: id!(64),
            user_id,
            email: email.to_string(),
            provider: Provider::detect(email),
            auth: MailAccountAuth::AppPassword,
            encrypted_password: Some(encrypt!(app_password)?),
            enabled: true,
            synced_folders: BTreeSet::new(),
            last_fetched_uid: 0,
            last_synced_at: None,
            created_at: utc_now!(),
            updated_at: utc_now!(),
        })
    }

    pub fn new_oauth(user_id: u64, email: &str) -> Self {
        Self {
            id: id!(64),
            user_id,
            email: email.to_string(),
            provider: Provider::Outlook,
            auth: MailAccountAuth::OAuth2,
            encrypted_password: None,
            enabled: true,
            synced_folders: BTreeSet::new(),
            last_fetched_uid: 0,
            last_synced_at: None,
            created_at: utc_now!(),
            updated_at: utc_now!(),
        }
    }

    pub fn imap_endpoint(&self) -> MailStashResult<(String, u16)> {
        self.provider.imap_endpoint()
    }

    pub async fn save(&self) -> MailStashResult<()> {
        insert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }

    pub async fn find(account_id: u64) -> MailStashResult<Option<MailAccount>> {
        secondary_find_impl(DB_MANAGER.meta_db(), MailAccountKey::id, account_id).await
    }

    pub async fn get(account_id: u64) -> MailStashResult<MailAccount> {
        Self::find(account_id).await?.ok_or_else(|| {
            raise_error!(
                format!("Account with ID '{account_id}' not found"),
                ErrorCode::ResourceNotFound
            )
        })
    }

    /// Ownership-checked fetch for API routes.
    pub async fn get_owned(account_id: u64, user_id: u64) -> MailStashResult<MailAccount> {
        let account = Self::get(account_id).await?;
        if account.user_id != user_id {
            return Err(raise_error!(
                format!("Account with ID '{account_id}' not found"),
                ErrorCode::ResourceNotFound
            ));
        }
        Ok(account)
    }

    pub async fn find_by_user_email(
        user_id: u64,
        email: &str,
    ) -> MailStashResult<Option<MailAccount>> {
        secondary_find_impl(
            DB_MANAGER.meta_db(),
            MailAccountKey::user_email,
            Self::user_email_key(user_id, email),
        )
        .await
    }

    pub async fn list_user(user_id: u64) -> MailStashResult<Vec<MailAccount>> {
        filter_by_secondary_key_impl(DB_MANAGER.meta_db(), MailAccountKey::user_id, user_id).await
    }

    pub async fn list_all() -> MailStashResult<Vec<MailAccount>> {
        list_all_impl(DB_MANAGER.meta_db()).await
    }

    pub async fn check_account_active(account_id: u64) -> MailStashResult<MailAccount> {
        let account = Self::get(account_id).await?;
        if !account.enabled {
            return Err(raise_error!(
                format!("Account id='{account_id}' is disabled"),
                ErrorCode::AccountDisabled
            ));
        }
        Ok(account)
    }

    /// Called at the end of a successful per-folder sync pass.
    pub async fn record_sync_progress(
        account_id: u64,
        folder: Option<String>,
        highest_uid: u32,
    ) -> MailStashResult<()> {
        update_impl(DB_MANAGER.meta_db(), move |rw| {
            rw.get().secondary::<MailAccount>(MailAccountKey::id, account_id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .ok_or_else(|| raise_error!(format!(
                    "When recording sync progress, the account record was not found. account_id={}",
                    account_id
                ), ErrorCode::ResourceNotFound))
        }, move |current| {
            let mut updated = current.clone();
            if let Some(folder) = folder {
                updated.synced_folders.insert(folder);
            }
            // the account watermark never regresses
            updated.last_fetched_uid = updated.last_fetched_uid.max(highest_uid);
            updated.last_synced_at = Some(utc_now!());
            updated.updated_at = utc_now!();
            Ok(updated)
        })
        .await?;
        Ok(())
    }

    pub async fn set_app_password(account_id: u64, app_password: &str) -> MailStashResult<()> {
        let encrypted = encrypt!(app_password)?;
        update_impl(DB_MANAGER.meta_db(), move |rw| {
            rw.get().secondary::<MailAccount>(MailAccountKey::id, account_id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .ok_or_else(|| raise_error!(format!(
                    "When updating the app password, the account record was not found. account_id={}",
                    account_id
                ), ErrorCode::ResourceNotFound))
        }, move |current| {
            let mut updated = current.clone();
            updated.encrypted_password = Some(encrypted);
            updated.updated_at = utc_now!();
            Ok(updated)
        })
        .await?;
        Ok(())
    }

    pub async fn set_enabled(account_id: u64, enabled: bool) -> MailStashResult<()> {
        update_impl(DB_MANAGER.meta_db(), move |rw| {
            rw.get().secondary::<MailAccount>(MailAccountKey::id, account_id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .ok_or_else(|| raise_error!(format!(
                    "When toggling the account, the record was not found. account_id={}",
                    account_id
                ), ErrorCode::ResourceNotFound))
        }, move |current| {
            let mut updated = current.clone();
            updated.enabled = enabled;
            updated.updated_at = utc_now!();
            Ok(updated)
        })
        .await?;
        Ok(())
    }

    async fn delete_record(account_id: u64) -> MailStashResult<()> {
        delete_impl(DB_MANAGER.meta_db(), move |rw| {
            rw.get().secondary::<MailAccount>(MailAccountKey::id, account_id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .ok_or_else(|| raise_error!(format!(
                    "The account entity with id={account_id} that you want to delete was not found."
                ), ErrorCode::ResourceNotFound))
        })
        .await
    }

    /// Removes the account and everything hanging off it: mirror rows (FTS
    /// cascading), folder state, tokens, attachment records, pooled
    /// connections, cached Graph folder ids.
    pub async fn delete_cascade(account_id: u64) -> MailStashResult<()> {
        let removed = MessageRecord::clean_account(account_id).await?;
        FolderUidState::clean_account(account_id).await?;
        GraphTokens::try_delete(account_id).await?;
        crate::modules::attachment::AttachmentRecord::clean_account(account_id).await?;
        MAIL_CONTEXT.clean_account(account_id).await?;
        GraphClient::evict_account_folder_ids(account_id);
        Self::delete_record(account_id).await?;
        info!(
            account_id,
            removed_messages = removed,
            "Account deleted with cascading cleanup"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn user_email_pair_is_unique() {
        let account =
            MailAccount::new_imap(1, "dup@gmail.com", "app-password-0000").unwrap();
        account.save().await.unwrap();

        let duplicate =
            MailAccount::new_imap(1, "dup@gmail.com", "app-password-0000").unwrap();
        assert!(duplicate.save().await.is_err());

        // a different user may link the same mailbox
        let other_user =
            MailAccount::new_imap(2, "dup@gmail.com", "app-password-0000").unwrap();
        other_user.save().await.unwrap();
    }

    #[tokio::test]
    async fn sync_progress_updates_watermark_and_folders() {
        let account = MailAccount::new_imap(3, "progress@gmail.com", "pw").unwrap();
        let account_id = account.id;
        account.save().await.unwrap();

        MailAccount::record_sync_progress(account_id, Some("INBOX".into()), 103)
            .await
            .unwrap();
        let loaded = MailAccount::get(account_id).await.unwrap();
        assert_eq!(loaded.last_fetched_uid, 103);
        assert!(loaded.synced_folders.contains("INBOX"));
        assert!(loaded.last_synced_at.is_some());

        // a smaller watermark from a lower-priority folder never regresses it
        MailAccount::record_sync_progress(account_id, Some("Sent".into()), 7)
            .await
            .unwrap();
        let loaded = MailAccount::get(account_id).await.unwrap();
        assert_eq!(loaded.last_fetched_uid, 103);
        assert!(loaded.synced_folders.contains("Sent"));
    }

    #[tokio::test]
    async fn oauth_account_never_takes_the_imap_path() {
        let account = MailAccount::new_oauth(4, "oauth@outlook.com");
        assert_eq!(account.auth, MailAccountAuth::OAuth2);
        assert!(account.encrypted_password.is_none());
    }
}
