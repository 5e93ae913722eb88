// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use native_db::*;
use native_model::{native_model, Model};
use poem_openapi::Object;
use serde::{Deserialize, Serialize};

use crate::{
    generate_token, id,
    modules::{
        database::{
            batch_delete_impl, filter_by_secondary_key_impl, insert_impl, manager::DB_MANAGER,
        },
        error::{code::ErrorCode, MailStashResult},
        settings::dir::DATA_DIR_MANAGER,
    },
    raise_error, utc_now,
};
use itertools::Itertools;

/// Uploaded attachment bookkeeping. The bytes themselves live behind the
/// blob sink; only the returned URL is recorded.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, Object)]
#[native_model(id = 6, version = 1)]
#[native_db]
pub struct AttachmentRecord {
    #[primary_key]
    pub id: u64,
    #[secondary_key]
    pub message_id: u64,
    #[secondary_key]
    pub account_id: u64,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub storage_url: String,
    pub created_at: i64,
}

impl AttachmentRecord {
    pub fn new(
        message_id: u64,
        account_id: u64,
        filename: String,
        content_type: String,
        size: u64,
        storage_url: String,
    ) -> Self {
        Self {
            id: id!(64),
            message_id,
            account_id,
            filename,
            content_type,
            size,
            storage_url,
            created_at: utc_now!(),
        }
    }

    pub async fn save(&self) -> MailStashResult<()> {
        insert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }

    pub async fn list_for_message(message_id: u64) -> MailStashResult<Vec<AttachmentRecord>> {
        filter_by_secondary_key_impl(
            DB_MANAGER.meta_db(),
            AttachmentRecordKey::message_id,
            message_id,
        )
        .await
    }

    pub async fn clean_account(account_id: u64) -> MailStashResult<()> {
        batch_delete_impl(DB_MANAGER.meta_db(), move |rw| {
            let records: Vec<AttachmentRecord> = rw
                .scan()
                .secondary::<AttachmentRecord>(AttachmentRecordKey::account_id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .start_with(account_id)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .try_collect()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            Ok(records)
        })
        .await?;
        Ok(())
    }
}

/// External blob storage boundary: hand in bytes, get back a URL.
pub trait BlobSink: Send + Sync {
    fn upload(
        &self,
        bytes: &[u8],
        content_type: &str,
        filename: &str,
    ) -> impl std::future::Future<Output = MailStashResult<String>> + Send;
}

/// Default sink: writes under the data dir and serves `/blobs/{key}`.
pub struct DiskBlobSink;

impl BlobSink for DiskBlobSink {
    async fn upload(
        &self,
        bytes: &[u8],
        content_type: &str,
        filename: &str,
    ) -> MailStashResult<String> {
        let extension = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string)
            .or_else(|| {
                mime_guess::get_mime_extensions_str(content_type)
                    .and_then(|extensions| extensions.first())
                    .map(|e| e.to_string())
            })
            .unwrap_or_else(|| "bin".into());
        let key = format!("{}.{}", generate_token!(128), extension);
        let path = DATA_DIR_MANAGER.blobs_dir.join(&key);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            raise_error!(
                format!("Failed to write blob {:?}: {}", path, e),
                ErrorCode::InternalError
            )
        })?;
        Ok(format!("/blobs/{}", key))
    }
}
