// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use crate::{
    modules::{
        context::Initialize,
        error::{code::ErrorCode, MailStashResult},
    },
    raise_error,
};

pub struct MailStashTls;

impl Initialize for MailStashTls {
    async fn initialize() -> MailStashResult<()> {
        rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider())
            .map_err(|_| {
                raise_error!(
                    "failed to set crypto provider".into(),
                    ErrorCode::InternalError
                )
            })
    }
}
