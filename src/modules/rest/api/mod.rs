// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use poem_openapi::{OpenApiService, Tags};

use crate::mailstash_version;

pub mod account;
pub mod auth;
pub mod message;
pub mod search;

#[derive(Tags)]
pub enum ApiTags {
    /// Signup, login, token refresh
    Auth,
    /// Linked upstream mailboxes
    Account,
    /// The mirrored message corpus
    Email,
    /// Full-text and sender search
    Search,
}

pub fn create_openapi_service() -> OpenApiService<
    (
        auth::AuthApi,
        account::AccountApi,
        message::EmailApi,
        search::SearchApi,
    ),
    (),
> {
    OpenApiService::new(
        (
            auth::AuthApi,
            account::AccountApi,
            message::EmailApi,
            search::SearchApi,
        ),
        "MailStash",
        mailstash_version!(),
    )
}
