// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use poem_openapi::Enum;
use serde::{Deserialize, Serialize};

use crate::{
    modules::error::{code::ErrorCode, MailStashResult},
    raise_error,
};

/// Canonical upstream provider tag, detected from the mailbox domain.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, Enum)]
#[serde(rename_all = "lowercase")]
#[oai(rename_all = "lowercase")]
pub enum Provider {
    Gmail,
    Outlook,
    Hotmail,
    Yahoo,
    Icloud,
    Aol,
    #[default]
    Unknown,
}

impl Provider {
    pub fn detect(email: &str) -> Provider {
        let domain = email
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_ascii_lowercase())
            .unwrap_or_default();
        match domain.as_str() {
            "gmail.com" => Provider::Gmail,
            "outlook.com" | "live.com" => Provider::Outlook,
            "hotmail.com" => Provider::Hotmail,
            "yahoo.com" => Provider::Yahoo,
            "icloud.com" | "me.com" => Provider::Icloud,
            "aol.com" => Provider::Aol,
            _ => Provider::Unknown,
        }
    }

    /// Well-known IMAP endpoint. Everything is implicit TLS on 993.
    pub fn imap_endpoint(&self) -> MailStashResult<(String, u16)> {
        let host = match self {
            Provider::Gmail => "imap.gmail.com",
            Provider::Outlook | Provider::Hotmail => "outlook.office365.com",
            Provider::Yahoo => "imap.mail.yahoo.com",
            Provider::Icloud => "imap.mail.me.com",
            Provider::Aol => "imap.aol.com",
            Provider::Unknown => {
                return Err(raise_error!(
                    "No IMAP endpoint is known for this provider".into(),
                    ErrorCode::InvalidParameter
                ))
            }
        };
        Ok((host.to_string(), 993))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gmail => "gmail",
            Provider::Outlook => "outlook",
            Provider::Hotmail => "hotmail",
            Provider::Yahoo => "yahoo",
            Provider::Icloud => "icloud",
            Provider::Aol => "aol",
            Provider::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_domains() {
        assert_eq!(Provider::detect("a@gmail.com"), Provider::Gmail);
        assert_eq!(Provider::detect("a@outlook.com"), Provider::Outlook);
        assert_eq!(Provider::detect("a@live.com"), Provider::Outlook);
        assert_eq!(Provider::detect("a@hotmail.com"), Provider::Hotmail);
        assert_eq!(Provider::detect("a@yahoo.com"), Provider::Yahoo);
        assert_eq!(Provider::detect("a@me.com"), Provider::Icloud);
        assert_eq!(Provider::detect("a@aol.com"), Provider::Aol);
        assert_eq!(Provider::detect("a@example.org"), Provider::Unknown);
    }

    #[test]
    fn detection_is_case_insensitive() {
        assert_eq!(Provider::detect("A@GMAIL.COM"), Provider::Gmail);
    }

    #[test]
    fn unknown_has_no_imap_endpoint() {
        assert!(Provider::Unknown.imap_endpoint().is_err());
        assert!(Provider::Gmail.imap_endpoint().is_ok());
    }
}
