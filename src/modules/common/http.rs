// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use std::time::Duration;

use serde_json::Value;

use crate::{
    modules::error::{code::ErrorCode, MailStashError, MailStashResult},
    raise_error,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin bearer-auth JSON client used by the Graph adapter and the Microsoft
/// token endpoint.
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> MailStashResult<Self> {
        let inner = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(Self { inner })
    }

    pub async fn get(&self, url: &str, access_token: &str) -> MailStashResult<Value> {
        let response = self
            .inner
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;
        Self::read_json(response).await
    }

    pub async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> MailStashResult<Value> {
        let response = self
            .inner
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(transport_error)?;
        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> MailStashResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::GraphUnexpectedPayload))
    }
}

fn transport_error(e: reqwest::Error) -> MailStashError {
    if e.is_timeout() {
        raise_error!(format!("{:#}", e), ErrorCode::ConnectionTimeout)
    } else {
        raise_error!(format!("{:#}", e), ErrorCode::ProviderUnavailable)
    }
}

/// Maps an upstream HTTP status onto the normalized error taxonomy:
/// 401/403 need user re-authorization, 5xx are retryable outages.
fn status_error(status: reqwest::StatusCode, body: &str) -> MailStashError {
    let code = if status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
    {
        ErrorCode::CredentialRejected
    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ErrorCode::TooManyRequest
    } else if status.is_server_error() {
        ErrorCode::ProviderUnavailable
    } else {
        ErrorCode::GraphApiCallFailed
    };
    raise_error!(
        format!("Upstream returned {}: {}", status.as_u16(), body),
        code
    )
}
