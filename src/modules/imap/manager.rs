// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use std::time::Duration;

use crate::modules::account::entity::MailAccount;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::{MailStashError, MailStashResult};
use crate::modules::imap::client::Client;
use crate::modules::imap::session::SessionStream;
use crate::{decrypt, raise_error};
use async_imap::Session;
use bb8::Pool;
use tracing::{error, warn};

const CONNECT_ATTEMPTS: usize = 3;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct ImapConnectionManager {
    pub account_id: u64,
}

impl ImapConnectionManager {
    pub fn new(account_id: u64) -> Self {
        Self { account_id }
    }

    async fn fetch_account(&self) -> MailStashResult<MailAccount> {
        MailAccount::get(self.account_id).await
    }

    pub async fn build(&self) -> MailStashResult<Session<Box<dyn SessionStream>>> {
        let account = self.fetch_account().await?;
        let (host, port) = account.imap_endpoint()?;

        let client = match connect_with_retry(&host, port).await {
            Ok(client) => client,
            Err(err) => {
                error!(
                    "Failed to create IMAP client for {}: {:#?}",
                    &account.email, err
                );
                return Err(err);
            }
        };

        let encrypted = account.encrypted_password.as_ref().ok_or_else(|| {
            raise_error!(
                "Account has no app password; it is not an IMAP account".into(),
                ErrorCode::MissingConfiguration
            )
        })?;
        let password = decrypt!(encrypted)?;
        client.login(&account.email, &password).await
    }
}

/// Dial with bounded retries: up to 3 attempts, 5s apart.
pub(crate) async fn connect_with_retry(host: &str, port: u16) -> MailStashResult<Client> {
    let mut last_error: Option<MailStashError> = None;
    for attempt in 1..=CONNECT_ATTEMPTS {
        match Client::connection(host.to_string(), port).await {
            Ok(client) => return Ok(client),
            Err(err) => {
                warn!(
                    "IMAP connect to {}:{} failed (attempt {}/{}): {:#?}",
                    host, port, attempt, CONNECT_ATTEMPTS, err
                );
                last_error = Some(err);
                if attempt < CONNECT_ATTEMPTS {
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        raise_error!("IMAP connection failed".into(), ErrorCode::NetworkError)
    }))
}

#[derive(Debug)]
pub struct ConnectionCheck {
    pub ok: bool,
    pub error: Option<String>,
}

/// Onboarding validation: connect, authenticate, log out. Never raises;
/// failures come back as `ConnectionCheck { ok: false, .. }`.
pub async fn test_connection(
    host: &str,
    port: u16,
    email: &str,
    password: &str,
) -> ConnectionCheck {
    let outcome = async {
        let client = connect_with_retry(host, port).await?;
        let mut session = client.login(email, password).await?;
        session
            .logout()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))?;
        Ok::<(), MailStashError>(())
    }
    .await;

    match outcome {
        Ok(()) => ConnectionCheck {
            ok: true,
            error: None,
        },
        Err(err) => ConnectionCheck {
            ok: false,
            error: Some(err.to_string()),
        },
    }
}

impl bb8::ManageConnection for ImapConnectionManager {
    type Connection = Session<Box<dyn SessionStream>>;
    type Error = MailStashError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        self.build().await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.noop()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::ImapCommandFailed))
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

pub async fn build_imap_pool(account_id: u64) -> MailStashResult<Pool<ImapConnectionManager>> {
    Pool::builder()
        .max_size(2)
        .connection_timeout(Duration::from_secs(60))
        .build(ImapConnectionManager::new(account_id))
        .await
}
