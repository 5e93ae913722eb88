// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::modules::attachment::{AttachmentRecord, BlobSink, DiskBlobSink};
use crate::modules::parser::ParsedAttachment;
use crate::modules::scheduler::task::{Task, TaskFuture};
use crate::modules::sync::{run_incremental_sync, run_initial_sync};
use crate::modules::tasks::queue::MailStashTaskQueue;

pub const INITIAL_SYNC_QUEUE: &str = "initial-sync";
pub const INCREMENTAL_SYNC_QUEUE: &str = "incremental-sync";
pub const ATTACHMENT_UPLOAD_QUEUE: &str = "attachment-upload";

/// Full discovery + sync of every eligible folder. Enqueued once at
/// onboarding (and again after OAuth re-authorization).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitialSyncTask {
    pub account_id: u64,
    pub email: String,
}

impl Task for InitialSyncTask {
    const TASK_KEY: &'static str = "initial-sync";
    const TASK_QUEUE: &'static str = INITIAL_SYNC_QUEUE;

    fn run(self, _task_id: u64) -> TaskFuture {
        Box::pin(async move { run_initial_sync(self.account_id).await })
    }
}

/// Delta pass over the folders that have synced successfully before.
/// Enqueued by the scheduler tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IncrementalSyncTask {
    pub account_id: u64,
    pub email: String,
    pub folders: Vec<String>,
}

impl Task for IncrementalSyncTask {
    const TASK_KEY: &'static str = "incremental-sync";
    const TASK_QUEUE: &'static str = INCREMENTAL_SYNC_QUEUE;

    fn run(self, _task_id: u64) -> TaskFuture {
        Box::pin(async move { run_incremental_sync(self.account_id, self.folders).await })
    }
}

/// Ships one parsed attachment to the blob sink and records the returned
/// URL. Message persistence never waits on this.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttachmentUploadTask {
    pub message_id: u64,
    pub account_id: u64,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Task for AttachmentUploadTask {
    const TASK_KEY: &'static str = "attachment-upload";
    const TASK_QUEUE: &'static str = ATTACHMENT_UPLOAD_QUEUE;

    fn run(self, _task_id: u64) -> TaskFuture {
        Box::pin(async move {
            let sink = DiskBlobSink;
            let url = sink
                .upload(&self.bytes, &self.content_type, &self.filename)
                .await?;
            AttachmentRecord::new(
                self.message_id,
                self.account_id,
                self.filename,
                self.content_type,
                self.bytes.len() as u64,
                url,
            )
            .save()
            .await
        })
    }
}

/// Fans parsed attachments out to the upload queue. Best effort: a full or
/// uninitialized queue costs the attachments, never the message.
pub async fn enqueue_attachment_uploads(
    message_id: u64,
    account_id: u64,
    attachments: Vec<ParsedAttachment>,
) {
    if attachments.is_empty() {
        return;
    }
    let queue = match MailStashTaskQueue::get() {
        Ok(queue) => queue,
        Err(_) => {
            debug!("task queue not running; skipping attachment uploads");
            return;
        }
    };
    for attachment in attachments {
        let task = AttachmentUploadTask {
            message_id,
            account_id,
            filename: attachment.filename,
            content_type: attachment.content_type,
            bytes: attachment.bytes,
        };
        if let Err(error) = queue.submit_task(task, None).await {
            warn!(message_id, %error, "failed to enqueue attachment upload");
        }
    }
}
