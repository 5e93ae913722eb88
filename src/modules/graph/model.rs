use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MailFoldersResponse {
    #[serde(rename = "@odata.context")]
    pub odata_context: Option<String>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
    #[serde(rename = "value")]
    pub value: Vec<MailFolder>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MailFolder {
    /// Opaque Graph folder id; kept in memory only, never mirrored
    #[serde(rename = "id")]
    pub id: String,

    #[serde(rename = "displayName")]
    pub display_name: String,

    #[serde(rename = "parentFolderId")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_folder_id: Option<String>,

    #[serde(rename = "totalItemCount")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_item_count: Option<u32>,

    #[serde(rename = "unreadItemCount")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_item_count: Option<u32>,

    #[serde(rename = "childFolderCount")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_folder_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessageListResponse {
    #[serde(rename = "@odata.context")]
    pub context: Option<String>,

    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,

    pub value: Vec<GraphMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphMessage {
    pub id: String,
    #[serde(rename = "internetMessageId")]
    pub internet_message_id: Option<String>,
    pub subject: Option<String>,
    #[serde(rename = "isRead")]
    pub is_read: Option<bool>,
    #[serde(rename = "receivedDateTime")]
    pub received_date_time: Option<String>,
    #[serde(rename = "sentDateTime")]
    pub sent_date_time: Option<String>,
    pub body: Option<ItemBody>,
    #[serde(rename = "bodyPreview")]
    pub body_preview: Option<String>,
    pub from: Option<Recipient>,
    pub sender: Option<Recipient>,
    #[serde(rename = "toRecipients")]
    pub to_recipients: Option<Vec<Recipient>>,
    #[serde(rename = "ccRecipients")]
    pub cc_recipients: Option<Vec<Recipient>>,
    pub attachments: Option<Vec<GraphAttachment>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ItemBody {
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Recipient {
    #[serde(rename = "emailAddress")]
    pub email_address: GraphEmailAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphEmailAddress {
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphAttachment {
    pub id: String,
    pub name: String,
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,
    pub size: Option<u32>,
    #[serde(rename = "isInline")]
    pub is_inline: Option<bool>,
    #[serde(rename = "contentId")]
    pub content_id: Option<String>,
    #[serde(rename = "contentBytes")]
    pub content_bytes: Option<String>,
}
