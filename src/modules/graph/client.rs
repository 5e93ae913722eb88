// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use dashmap::DashMap;
use std::sync::LazyLock;

use crate::{
    modules::{
        common::http::HttpClient,
        error::{code::ErrorCode, MailStashResult},
        graph::model::{GraphMessage, MailFolder, MailFoldersResponse, MessageListResponse},
        oauth2::tokens::GraphTokens,
    },
    raise_error,
};

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Safety bound on messages pulled per folder per run.
pub const MAX_MESSAGES_PER_RUN: usize = 500;

const MESSAGE_SELECT: &str = "id,isRead,internetMessageId,from,sender,body,toRecipients,\
ccRecipients,subject,receivedDateTime,sentDateTime,bodyPreview";

/// Folder ids by (account_id, canonical folder name). Display-name lookup is
/// O(folders) per listing; resolved ids are reused across sync runs.
static FOLDER_ID_CACHE: LazyLock<DashMap<(u64, String), String>> = LazyLock::new(DashMap::new);

pub struct GraphClient;

impl GraphClient {
    async fn access_token(account_id: u64) -> MailStashResult<String> {
        let record = GraphTokens::get(account_id).await?;
        record.and_then(|r| r.access_token).ok_or_else(|| {
            raise_error!(
                "Graph API requires an OAuth2 access token, but authorization is incomplete."
                    .into(),
                ErrorCode::MissingConfiguration
            )
        })
    }

    async fn fetch_mailfolders_page(
        client: &HttpClient,
        url: &str,
        access_token: &str,
    ) -> MailStashResult<MailFoldersResponse> {
        let value = client.get(url, access_token).await?;
        let folders = serde_json::from_value::<MailFoldersResponse>(value).map_err(|e| {
            raise_error!(
                format!(
                    "Failed to deserialize Graph mailFolders response: {:#?}. Possible model mismatch or API change.",
                    e
                ),
                ErrorCode::GraphUnexpectedPayload
            )
        })?;
        Ok(folders)
    }

    /// Lists every mail folder, following `@odata.nextLink` until exhausted.
    pub async fn list_mail_folders(account_id: u64) -> MailStashResult<Vec<MailFolder>> {
        let client = HttpClient::new()?;
        let access_token = Self::access_token(account_id).await?;
        let mut url = format!("{GRAPH_BASE}/me/mailFolders?$top=100");
        let mut result = Vec::new();
        loop {
            let resp = Self::fetch_mailfolders_page(&client, &url, &access_token).await?;
            result.extend(resp.value);
            match resp.next_link {
                Some(next) => url = next,
                None => break,
            }
        }
        Ok(result)
    }

    pub fn cache_folder_id(account_id: u64, canonical: &str, folder_id: &str) {
        FOLDER_ID_CACHE.insert((account_id, canonical.to_string()), folder_id.to_string());
    }

    pub fn cached_folder_id(account_id: u64, canonical: &str) -> Option<String> {
        FOLDER_ID_CACHE
            .get(&(account_id, canonical.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn evict_account_folder_ids(account_id: u64) {
        FOLDER_ID_CACHE.retain(|(id, _), _| *id != account_id);
    }

    /// Messages in a folder received at or after `since` (RFC 3339), capped at
    /// `MAX_MESSAGES_PER_RUN` across pages.
    pub async fn list_messages_since(
        account_id: u64,
        folder_id: &str,
        since: &str,
    ) -> MailStashResult<Vec<GraphMessage>> {
        let client = HttpClient::new()?;
        let access_token = Self::access_token(account_id).await?;
        let mut url = format!(
            "{GRAPH_BASE}/me/mailFolders/{folder_id}/messages?\
$top=50&$orderBy=receivedDateTime desc&$select={MESSAGE_SELECT}&\
$expand=attachments&$filter=receivedDateTime ge {since}"
        );
        let mut messages = Vec::new();
        loop {
            let value = client.get(&url, &access_token).await?;
            let page = serde_json::from_value::<MessageListResponse>(value).map_err(|e| {
                raise_error!(
                    format!(
                        "Failed to deserialize Graph messages response: {:#?}. Possible model mismatch or API change.",
                        e
                    ),
                    ErrorCode::GraphUnexpectedPayload
                )
            })?;
            messages.extend(page.value);
            if messages.len() >= MAX_MESSAGES_PER_RUN {
                messages.truncate(MAX_MESSAGES_PER_RUN);
                break;
            }
            match page.next_link {
                Some(next) => url = next,
                None => break,
            }
        }
        Ok(messages)
    }
}
