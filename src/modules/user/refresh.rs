// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

use crate::{
    generate_token, id,
    modules::{
        database::{insert_impl, manager::DB_MANAGER, secondary_find_impl, update_impl},
        error::{code::ErrorCode, MailStashResult},
        settings::cli::SETTINGS,
        utils::sha256_hex,
    },
    raise_error, utc_now,
};

const MS_PER_DAY: i64 = 86_400_000;

/// Refresh-token record. Only the SHA-256 of the opaque token is stored;
/// rotation is single-use: a consumed token is revoked and points at its
/// successor, the same discipline applied to upstream Graph refresh tokens.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[native_model(id = 5, version = 1)]
#[native_db]
pub struct RefreshTokenEntity {
    #[primary_key]
    pub id: u64,
    #[secondary_key(unique)]
    pub token_hash: String,
    #[secondary_key]
    pub user_id: u64,
    pub expires_at: i64,
    pub revoked: bool,
    pub replaced_by: Option<u64>,
    pub created_at: i64,
}

impl RefreshTokenEntity {
    /// Mints a fresh token for the user and persists its hash. Returns the
    /// plaintext token (shown to the client exactly once).
    pub async fn issue(user_id: u64) -> MailStashResult<String> {
        let token = generate_token!(256);
        let entity = Self {
            id: id!(64),
            token_hash: sha256_hex(&token),
            user_id,
            expires_at: utc_now!()
                + SETTINGS.mailstash_refresh_token_ttl_days as i64 * MS_PER_DAY,
            revoked: false,
            replaced_by: None,
            created_at: utc_now!(),
        };
        insert_impl(DB_MANAGER.meta_db(), entity).await?;
        Ok(token)
    }

    pub async fn find_by_token(token: &str) -> MailStashResult<Option<RefreshTokenEntity>> {
        secondary_find_impl(
            DB_MANAGER.meta_db(),
            RefreshTokenEntityKey::token_hash,
            sha256_hex(token),
        )
        .await
    }

    /// Single-use rotation: validates the presented token, revokes it, links
    /// it to its successor and returns `(new_token, user_id)`.
    pub async fn rotate(token: &str) -> MailStashResult<(String, u64)> {
        let invalid =
            || raise_error!("Invalid refresh token".into(), ErrorCode::PermissionDenied);

        let current = Self::find_by_token(token).await?.ok_or_else(invalid)?;
        if current.revoked || current.expires_at <= utc_now!() {
            return Err(invalid());
        }

        let user_id = current.user_id;
        let replacement = Self::issue(user_id).await?;
        let replacement_entity = Self::find_by_token(&replacement)
            .await?
            .ok_or_else(|| raise_error!("Rotation bookkeeping failed".into(), ErrorCode::InternalError))?;

        let current_id = current.id;
        let replacement_id = replacement_entity.id;
        update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .primary::<RefreshTokenEntity>(current_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            "Refresh token vanished during rotation".into(),
                            ErrorCode::InternalError
                        )
                    })
            },
            move |current| {
                let mut updated = current.clone();
                updated.revoked = true;
                updated.replaced_by = Some(replacement_id);
                Ok(updated)
            },
        )
        .await?;

        Ok((replacement, user_id))
    }

    /// Logout: revokes the presented token without a successor.
    pub async fn revoke(token: &str) -> MailStashResult<()> {
        let current = Self::find_by_token(token).await?.ok_or_else(|| {
            raise_error!("Invalid refresh token".into(), ErrorCode::PermissionDenied)
        })?;
        let current_id = current.id;
        update_impl(
            DB_MANAGER.meta_db(),
            move |rw| {
                rw.get()
                    .primary::<RefreshTokenEntity>(current_id)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            "Refresh token vanished during revocation".into(),
                            ErrorCode::InternalError
                        )
                    })
            },
            move |current| {
                let mut updated = current.clone();
                updated.revoked = true;
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rotation_is_single_use() {
        let token = RefreshTokenEntity::issue(77).await.unwrap();

        let (replacement, user_id) = RefreshTokenEntity::rotate(&token).await.unwrap();
        assert_eq!(user_id, 77);
        assert_ne!(replacement, token);

        // the consumed token cannot be replayed
        assert!(RefreshTokenEntity::rotate(&token).await.is_err());
        // its record points at the successor
        let consumed = RefreshTokenEntity::find_by_token(&token)
            .await
            .unwrap()
            .unwrap();
        assert!(consumed.revoked);
        assert!(consumed.replaced_by.is_some());

        // while the replacement still works
        assert!(RefreshTokenEntity::rotate(&replacement).await.is_ok());
    }

    #[tokio::test]
    async fn revoked_token_cannot_refresh() {
        let token = RefreshTokenEntity::issue(78).await.unwrap();
        RefreshTokenEntity::revoke(&token).await.unwrap();
        assert!(RefreshTokenEntity::rotate(&token).await.is_err());
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        assert!(RefreshTokenEntity::rotate("no-such-token").await.is_err());
    }
}
