// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use poem::web::Path;
use poem_openapi::{payload::Json, OpenApi};
use tracing::info;

use crate::modules::account::entity::{MailAccount, MailAccountAuth};
use crate::modules::account::payload::{
    AccountUpdateRequest, ImapAccountCreateRequest, OAuthAccountUpsertRequest,
};
use crate::modules::account::provider::Provider;
use crate::modules::common::auth::UserContext;
use crate::modules::error::code::ErrorCode;
use crate::modules::imap::manager::test_connection;
use crate::modules::oauth2::tokens::GraphTokens;
use crate::modules::rest::api::ApiTags;
use crate::modules::rest::ApiResult;
use crate::modules::sync::task::InitialSyncTask;
use crate::modules::tasks::queue::MailStashTaskQueue;
use crate::{raise_error, validate_email};

pub struct AccountApi;

#[OpenApi(prefix_path = "/api/v1", tag = "ApiTags::Account")]
impl AccountApi {
    /// Link an IMAP mailbox with a per-app password
    #[oai(path = "/accounts", method = "post", operation_id = "create_account")]
    async fn create_account(
        &self,
        payload: Json<ImapAccountCreateRequest>,
        user: UserContext,
    ) -> ApiResult<Json<MailAccount>> {
        validate_email!(&payload.email)?;
        if MailAccount::find_by_user_email(user.user_id, &payload.email)
            .await?
            .is_some()
        {
            return Err(raise_error!(
                "This mailbox is already linked".into(),
                ErrorCode::AlreadyExists
            )
            .into());
        }

        let provider = Provider::detect(&payload.email);
        let (host, port) = provider.imap_endpoint().map_err(|_| {
            raise_error!(
                format!(
                    "Unsupported mail provider for '{}'; connect a known provider or use OAuth",
                    payload.email
                ),
                ErrorCode::InvalidParameter
            )
        })?;

        // live connect + logout before anything is persisted
        let check = test_connection(&host, port, &payload.email, &payload.app_password).await;
        if !check.ok {
            return Err(raise_error!(
                format!(
                    "Could not sign in to the mailbox: {}",
                    check.error.unwrap_or_default()
                ),
                ErrorCode::CredentialRejected
            )
            .into());
        }

        let account = MailAccount::new_imap(user.user_id, &payload.email, &payload.app_password)?;
        account.save().await?;

        MailStashTaskQueue::get()?
            .submit_task(
                InitialSyncTask {
                    account_id: account.id,
                    email: account.email.clone(),
                },
                None,
            )
            .await?;

        info!(account_id = account.id, email = %account.email, "IMAP account linked");
        Ok(Json(account))
    }

    /// Link (or re-authorize) a Microsoft Graph mailbox from the OAuth callback
    #[oai(
        path = "/accounts/oauth",
        method = "post",
        operation_id = "upsert_oauth_account"
    )]
    async fn upsert_oauth_account(
        &self,
        payload: Json<OAuthAccountUpsertRequest>,
        user: UserContext,
    ) -> ApiResult<Json<MailAccount>> {
        validate_email!(&payload.email)?;

        let account = match MailAccount::find_by_user_email(user.user_id, &payload.email).await? {
            Some(existing) => {
                if existing.auth != MailAccountAuth::OAuth2 {
                    return Err(raise_error!(
                        "This mailbox is already linked with an app password".into(),
                        ErrorCode::AlreadyExists
                    )
                    .into());
                }
                existing
            }
            None => {
                let account = MailAccount::new_oauth(user.user_id, &payload.email);
                account.save().await?;
                account
            }
        };

        // token rotation: the latest pair always wins
        GraphTokens::create(
            account.id,
            payload.access_token.clone(),
            payload.refresh_token.clone(),
        )?
        .save_or_update()
        .await?;

        MailStashTaskQueue::get()?
            .submit_task(
                InitialSyncTask {
                    account_id: account.id,
                    email: account.email.clone(),
                },
                None,
            )
            .await?;

        info!(account_id = account.id, email = %account.email, "Graph account linked");
        Ok(Json(account))
    }

    /// List the caller's linked mailboxes
    #[oai(path = "/accounts", method = "get", operation_id = "list_accounts")]
    async fn list_accounts(&self, user: UserContext) -> ApiResult<Json<Vec<MailAccount>>> {
        Ok(Json(MailAccount::list_user(user.user_id).await?))
    }

    /// Get one linked mailbox
    #[oai(
        path = "/accounts/:account_id",
        method = "get",
        operation_id = "get_account"
    )]
    async fn get_account(
        &self,
        account_id: Path<u64>,
        user: UserContext,
    ) -> ApiResult<Json<MailAccount>> {
        Ok(Json(
            MailAccount::get_owned(account_id.0, user.user_id).await?,
        ))
    }

    /// Update a linked mailbox (re-entered app password, enable/disable)
    #[oai(
        path = "/accounts/:account_id",
        method = "patch",
        operation_id = "update_account"
    )]
    async fn update_account(
        &self,
        account_id: Path<u64>,
        payload: Json<AccountUpdateRequest>,
        user: UserContext,
    ) -> ApiResult<()> {
        let account = MailAccount::get_owned(account_id.0, user.user_id).await?;

        if let Some(app_password) = &payload.app_password {
            if account.auth != MailAccountAuth::AppPassword {
                return Err(raise_error!(
                    "OAuth accounts have no app password".into(),
                    ErrorCode::InvalidParameter
                )
                .into());
            }
            let (host, port) = account.imap_endpoint()?;
            let check = test_connection(&host, port, &account.email, app_password).await;
            if !check.ok {
                return Err(raise_error!(
                    format!(
                        "Could not sign in with the new password: {}",
                        check.error.unwrap_or_default()
                    ),
                    ErrorCode::CredentialRejected
                )
                .into());
            }
            MailAccount::set_app_password(account.id, app_password).await?;
        }

        if let Some(enabled) = payload.enabled {
            MailAccount::set_enabled(account.id, enabled).await?;
        }
        Ok(())
    }

    /// Unlink a mailbox — removes all mirrored messages and credentials
    #[oai(
        path = "/accounts/:account_id",
        method = "delete",
        operation_id = "remove_account"
    )]
    async fn remove_account(&self, account_id: Path<u64>, user: UserContext) -> ApiResult<()> {
        let account = MailAccount::get_owned(account_id.0, user.user_id).await?;
        MailAccount::delete_cascade(account.id).await?;
        Ok(())
    }
}
