use poem_openapi::Object;
use serde::{Deserialize, Serialize};

/// IMAP onboarding request: a remote mailbox plus its per-app password.
#[derive(Clone, Debug, Serialize, Deserialize, Object)]
pub struct ImapAccountCreateRequest {
    #[oai(validator(custom = "crate::modules::common::validator::EmailValidator"))]
    pub email: String,
    #[oai(validator(min_length = 1))]
    pub app_password: String,
}

/// OAuth callback payload for a Microsoft Graph mailbox. Posting again for an
/// already linked account rotates the stored token pair.
#[derive(Clone, Debug, Serialize, Deserialize, Object)]
pub struct OAuthAccountUpsertRequest {
    #[oai(validator(custom = "crate::modules::common::validator::EmailValidator"))]
    pub email: String,
    #[oai(validator(min_length = 1))]
    pub access_token: String,
    #[oai(validator(min_length = 1))]
    pub refresh_token: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Object)]
pub struct AccountUpdateRequest {
    /// Re-entered app password (IMAP accounts only)
    pub app_password: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Object)]
pub struct ReadStatusRequest {
    pub is_read: bool,
}
