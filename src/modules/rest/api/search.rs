// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use poem_openapi::{param::Query, payload::Json, OpenApi};

use crate::modules::account::entity::MailAccount;
use crate::modules::common::auth::UserContext;
use crate::modules::common::paginated::paginate_vec;
use crate::modules::mirror::entity::MessageRecord;
use crate::modules::mirror::fts::FtsEntry;
use crate::modules::rest::api::ApiTags;
use crate::modules::rest::response::DataPage;
use crate::modules::rest::ApiResult;

pub struct SearchApi;

#[OpenApi(prefix_path = "/api/v1", tag = "ApiTags::Search")]
impl SearchApi {
    /// Search the mirrored corpus.
    ///
    /// `q` runs a ranked full-text query over subject, body and sender;
    /// `sender` is a case-insensitive substring match on the from address.
    /// An empty or whitespace-only `q` yields an empty page.
    #[oai(path = "/search", method = "get", operation_id = "search_emails")]
    async fn search(
        &self,
        q: Query<Option<String>>,
        sender: Query<Option<String>>,
        page: Query<Option<u64>>,
        limit: Query<Option<u64>>,
        user: UserContext,
    ) -> ApiResult<Json<DataPage<MessageRecord>>> {
        let account_ids: Vec<u64> = MailAccount::list_user(user.user_id)
            .await?
            .into_iter()
            .map(|account| account.id)
            .collect();

        let page_no = page.0.or(Some(1));
        let page_size = limit.0.or(Some(50));

        if let Some(query) = q.0.as_deref() {
            // ranked ids first, then hydrate and drop tombstones
            let ranked = FtsEntry::search(&account_ids, query).await?;
            let mut messages = Vec::with_capacity(ranked.len());
            for message_id in ranked {
                if let Some(message) = MessageRecord::find(message_id).await? {
                    if message.deleted_at.is_none() {
                        messages.push(message);
                    }
                }
            }
            let paginated = paginate_vec(&messages, page_no, page_size)?;
            return Ok(Json(DataPage::from(paginated)));
        }

        if let Some(fragment) = sender.0.as_deref() {
            let needle = fragment.to_lowercase();
            let mut messages = Vec::new();
            for account_id in account_ids {
                let rows = MessageRecord::list_account(account_id).await?;
                messages.extend(
                    rows.into_iter()
                        .filter(|m| m.from_addr.to_lowercase().contains(&needle)),
                );
            }
            messages.sort_by(|a, b| b.received_at.cmp(&a.received_at));
            let paginated = paginate_vec(&messages, page_no, page_size)?;
            return Ok(Json(DataPage::from(paginated)));
        }

        let empty: Vec<MessageRecord> = Vec::new();
        let paginated = paginate_vec(&empty, page_no, page_size)?;
        Ok(Json(DataPage::from(paginated)))
    }
}
