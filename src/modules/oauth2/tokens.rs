// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use crate::{
    decrypt, encrypt,
    modules::{
        database::{async_find_impl, delete_impl, manager::DB_MANAGER, update_impl, upsert_impl},
        error::{code::ErrorCode, MailStashResult},
    },
    raise_error, utc_now,
};
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

/// Graph OAuth2 token pair for one mail account. Both tokens are encrypted
/// with the vault before hitting disk; `get` hands back plaintext.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[native_model(id = 4, version = 1)]
#[native_db]
pub struct GraphTokens {
    #[primary_key]
    pub account_id: u64,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl GraphTokens {
    pub fn create(
        account_id: u64,
        access_token: String,
        refresh_token: String,
    ) -> MailStashResult<Self> {
        Ok(Self {
            account_id,
            access_token: Some(encrypt!(&access_token)?),
            refresh_token: Some(encrypt!(&refresh_token)?),
            created_at: utc_now!(),
            updated_at: utc_now!(),
        })
    }

    // Called again on every re-authorization, so upsert.
    pub async fn save_or_update(&self) -> MailStashResult<()> {
        upsert_impl(DB_MANAGER.meta_db(), self.clone()).await
    }

    pub async fn get(account_id: u64) -> MailStashResult<Option<GraphTokens>> {
        async_find_impl::<GraphTokens>(DB_MANAGER.meta_db(), account_id)
            .await?
            .map(|mut tokens| {
                tokens.access_token = tokens.access_token.map(|t| decrypt!(&t)).transpose()?;
                tokens.refresh_token = tokens.refresh_token.map(|t| decrypt!(&t)).transpose()?;
                Ok(tokens)
            })
            .transpose()
    }

    /// Persists a rotated token pair in one transaction. Callers MUST invoke
    /// this before the new access token is used for any provider read, so a
    /// crash mid-sync cannot strand the account on a consumed refresh token.
    pub async fn rotate(
        account_id: u64,
        access_token: String,
        refresh_token: String,
    ) -> MailStashResult<()> {
        let access_token = encrypt!(&access_token)?;
        let refresh_token = encrypt!(&refresh_token)?;
        update_impl(DB_MANAGER.meta_db(), move |rw| {
            rw.get().primary::<GraphTokens>(account_id)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
            .ok_or_else(|| raise_error!(format!(
                "The token record for account_id={account_id} that you want to rotate was not found."
            ), ErrorCode::ResourceNotFound))
        }, move |current| {
            let mut updated = current.clone();
            updated.access_token = Some(access_token);
            updated.refresh_token = Some(refresh_token);
            updated.updated_at = utc_now!();
            Ok(updated)
        }).await?;
        Ok(())
    }

    pub async fn try_delete(account_id: u64) -> MailStashResult<()> {
        if async_find_impl::<GraphTokens>(DB_MANAGER.meta_db(), account_id)
            .await?
            .is_none()
        {
            return Ok(());
        }

        delete_impl(DB_MANAGER.meta_db(), move |rw| {
            rw.get().primary::<GraphTokens>(account_id)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
            .ok_or_else(|| raise_error!(format!(
                "The token record for account_id={account_id} that you want to delete was not found."
            ), ErrorCode::ResourceNotFound))
        }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tokens_roundtrip_through_the_vault() {
        let tokens = GraphTokens::create(1000u64, "access_token".into(), "refresh_token".into())
            .unwrap();
        // ciphertext at rest
        assert_ne!(tokens.access_token.as_deref(), Some("access_token"));
        tokens.save_or_update().await.unwrap();

        let loaded = GraphTokens::get(1000u64).await.unwrap().unwrap();
        assert_eq!(loaded.access_token, Some("access_token".into()));
        assert_eq!(loaded.refresh_token, Some("refresh_token".into()));
    }

    #[tokio::test]
    async fn rotation_replaces_both_tokens() {
        let tokens = GraphTokens::create(1001u64, "old-access".into(), "old-refresh".into())
            .unwrap();
        tokens.save_or_update().await.unwrap();

        GraphTokens::rotate(1001u64, "new-access".into(), "new-refresh".into())
            .await
            .unwrap();

        let loaded = GraphTokens::get(1001u64).await.unwrap().unwrap();
        assert_eq!(loaded.access_token, Some("new-access".into()));
        assert_eq!(loaded.refresh_token, Some("new-refresh".into()));
    }
}
