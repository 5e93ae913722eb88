// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use crate::{
    modules::{
        common::http::HttpClient,
        error::{code::ErrorCode, MailStashError, MailStashResult},
        settings::cli::SETTINGS,
    },
    raise_error,
};

const TOKEN_ENDPOINT: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default offline_access";

#[derive(Debug)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Microsoft rotates the refresh token on most grants; absent means the
    /// old one stays valid.
    pub refresh_token: Option<String>,
}

/// Exchanges a refresh token for a fresh access token. 4xx from the token
/// endpoint means the grant is gone and the user must sign in again; that is
/// surfaced as `CredentialRejected` so the job fails without retry.
pub async fn refresh_microsoft_token(refresh_token: &str) -> MailStashResult<RefreshedToken> {
    let client_id = SETTINGS.mailstash_ms_client_id.as_deref().ok_or_else(|| {
        raise_error!(
            "MAILSTASH_MS_CLIENT_ID is not configured".into(),
            ErrorCode::MissingConfiguration
        )
    })?;
    let client_secret = SETTINGS
        .mailstash_ms_client_secret
        .as_deref()
        .ok_or_else(|| {
            raise_error!(
                "MAILSTASH_MS_CLIENT_SECRET is not configured".into(),
                ErrorCode::MissingConfiguration
            )
        })?;

    let client = HttpClient::new()?;
    let params = [
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("scope", GRAPH_SCOPE),
    ];

    let value = client
        .post_form(TOKEN_ENDPOINT, &params)
        .await
        .map_err(reclassify_token_endpoint_error)?;

    let access_token = value
        .get("access_token")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| {
            raise_error!(
                "Token endpoint response carried no access_token".into(),
                ErrorCode::GraphUnexpectedPayload
            )
        })?;
    let refresh_token = value
        .get("refresh_token")
        .and_then(|v| v.as_str())
        .map(String::from);

    Ok(RefreshedToken {
        access_token,
        refresh_token,
    })
}

/// The token endpoint reports a dead grant (`invalid_grant`) as a plain 400,
/// which the shared client classifies as a generic API failure. Here any
/// non-retryable 4xx means sign-in is required.
fn reclassify_token_endpoint_error(error: MailStashError) -> MailStashError {
    match error.code() {
        ErrorCode::GraphApiCallFailed => {
            raise_error!(error.to_string(), ErrorCode::CredentialRejected)
        }
        _ => error,
    }
}
