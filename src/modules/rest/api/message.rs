// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use poem::web::Path;
use poem_openapi::{param::Query, payload::Json, OpenApi};

use crate::modules::account::entity::MailAccount;
use crate::modules::account::payload::ReadStatusRequest;
use crate::modules::attachment::AttachmentRecord;
use crate::modules::common::auth::UserContext;
use crate::modules::common::paginated::paginate_vec;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailStashResult;
use crate::modules::mirror::entity::MessageRecord;
use crate::modules::rest::api::ApiTags;
use crate::modules::rest::response::DataPage;
use crate::modules::rest::ApiResult;
use crate::raise_error;

pub struct EmailApi;

/// Resolves a message and proves the caller owns the account it belongs to.
async fn get_owned_message(message_id: u64, user_id: u64) -> MailStashResult<MessageRecord> {
    let message = MessageRecord::get(message_id).await?;
    let account = MailAccount::get(message.account_id).await?;
    if account.user_id != user_id {
        return Err(raise_error!(
            format!("Message with id '{message_id}' not found"),
            ErrorCode::ResourceNotFound
        ));
    }
    Ok(message)
}

#[OpenApi(prefix_path = "/api/v1", tag = "ApiTags::Email")]
impl EmailApi {
    /// List mirrored emails, newest first
    #[oai(path = "/emails", method = "get", operation_id = "list_emails")]
    async fn list_emails(
        &self,
        /// Restrict to one linked account
        account_id: Query<Option<u64>>,
        /// Canonical folder name (e.g. INBOX, Sent)
        folder: Query<Option<String>>,
        is_read: Query<Option<bool>>,
        /// Received-at lower bound, epoch milliseconds
        from_date: Query<Option<i64>>,
        /// Received-at upper bound, epoch milliseconds
        to_date: Query<Option<i64>>,
        page: Query<Option<u64>>,
        limit: Query<Option<u64>>,
        user: UserContext,
    ) -> ApiResult<Json<DataPage<MessageRecord>>> {
        let account_ids: Vec<u64> = match account_id.0 {
            Some(id) => {
                let account = MailAccount::get_owned(id, user.user_id).await?;
                vec![account.id]
            }
            None => MailAccount::list_user(user.user_id)
                .await?
                .into_iter()
                .map(|account| account.id)
                .collect(),
        };

        let mut messages = Vec::new();
        for id in account_ids {
            messages.extend(MessageRecord::list_account(id).await?);
        }
        if let Some(folder) = &folder.0 {
            messages.retain(|m| &m.folder == folder);
        }
        if let Some(is_read) = is_read.0 {
            messages.retain(|m| m.is_read == is_read);
        }
        if let Some(from_date) = from_date.0 {
            messages.retain(|m| m.received_at >= from_date);
        }
        if let Some(to_date) = to_date.0 {
            messages.retain(|m| m.received_at <= to_date);
        }
        messages.sort_by(|a, b| b.received_at.cmp(&a.received_at));

        let page = paginate_vec(&messages, page.0.or(Some(1)), limit.0.or(Some(50)))?;
        Ok(Json(DataPage::from(page)))
    }

    /// Get one mirrored email
    #[oai(path = "/emails/:email_id", method = "get", operation_id = "get_email")]
    async fn get_email(
        &self,
        email_id: Path<u64>,
        user: UserContext,
    ) -> ApiResult<Json<MessageRecord>> {
        let message = get_owned_message(email_id.0, user.user_id).await?;
        if message.deleted_at.is_some() {
            return Err(raise_error!(
                format!("Message with id '{}' not found", email_id.0),
                ErrorCode::ResourceNotFound
            )
            .into());
        }
        Ok(Json(message))
    }

    /// Flip the local read flag — never propagated upstream
    #[oai(
        path = "/emails/:email_id/read-status",
        method = "patch",
        operation_id = "set_read_status"
    )]
    async fn set_read_status(
        &self,
        email_id: Path<u64>,
        payload: Json<ReadStatusRequest>,
        user: UserContext,
    ) -> ApiResult<()> {
        let message = get_owned_message(email_id.0, user.user_id).await?;
        MessageRecord::set_read_status(message.id, payload.is_read).await?;
        Ok(())
    }

    /// List the uploaded attachments of one email
    #[oai(
        path = "/emails/:email_id/attachments",
        method = "get",
        operation_id = "list_email_attachments"
    )]
    async fn list_attachments(
        &self,
        email_id: Path<u64>,
        user: UserContext,
    ) -> ApiResult<Json<Vec<AttachmentRecord>>> {
        let message = get_owned_message(email_id.0, user.user_id).await?;
        Ok(Json(AttachmentRecord::list_for_message(message.id).await?))
    }

    /// Soft-delete a mirrored email. The tombstone keeps the message from
    /// being re-mirrored by later syncs.
    #[oai(
        path = "/emails/:email_id",
        method = "delete",
        operation_id = "delete_email"
    )]
    async fn delete_email(&self, email_id: Path<u64>, user: UserContext) -> ApiResult<()> {
        let message = get_owned_message(email_id.0, user.user_id).await?;
        MessageRecord::soft_delete(message.id).await?;
        Ok(())
    }
}
