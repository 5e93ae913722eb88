// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use mail_parser::{Addr as MailAddr, Address as MailAddress};
use poem::error::ResponseError;
use poem::{http::StatusCode, Body, Error, Response};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use tracing::error;

use crate::modules::error::{code::ErrorCode, MailStashError};

pub mod auth;
pub mod http;
pub mod log;
pub mod paginated;
pub mod rustls;
pub mod signal;
pub mod tls;
pub mod validator;

/// A parsed mail address: optional display name plus optional bare address.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Addr {
    pub name: Option<String>,
    pub address: Option<String>,
}

impl Addr {
    pub fn parse(s: &str) -> Self {
        let re = Regex::new(r#"(?:(?P<name>.*)\s*)?<(?P<email>[^<>]+)>"#).unwrap();
        if let Some(caps) = re.captures(s) {
            let name: Option<String> = caps.name("name").map(|m| m.as_str().trim().into());
            let email: Option<String> = caps.name("email").map(|m| m.as_str().trim().into());
            Addr {
                name: name.filter(|n| !n.is_empty()),
                address: email,
            }
        } else {
            let s_trimmed = s.trim();
            Addr {
                name: None,
                address: if s_trimmed.is_empty() {
                    None
                } else {
                    Some(s_trimmed.into())
                },
            }
        }
    }

    /// Canonical rendering: `"Name" <addr>` when both are present, the bare
    /// address otherwise, empty string when nothing is known.
    pub fn render(&self) -> String {
        match (&self.name, &self.address) {
            (Some(name), Some(address)) => format!("\"{}\" <{}>", name, address),
            (None, Some(address)) => address.clone(),
            (Some(name), None) => name.clone(),
            (None, None) => String::new(),
        }
    }
}

impl std::fmt::Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl<'x> From<&MailAddr<'x>> for Addr {
    fn from(original: &MailAddr<'x>) -> Self {
        Addr {
            name: original.name.as_ref().map(|s| s.to_string()),
            address: original.address.as_ref().map(|s| s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddrVec(pub Vec<Addr>);

impl Deref for AddrVec {
    type Target = Vec<Addr>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'x> From<&MailAddress<'x>> for AddrVec {
    fn from(original: &MailAddress<'x>) -> Self {
        let vec = match original {
            MailAddress::List(addrs) => addrs.iter().map(Addr::from).collect(),
            MailAddress::Group(groups) => groups
                .iter()
                .flat_map(|group| group.addresses.iter().map(Addr::from))
                .collect(),
        };
        AddrVec(vec)
    }
}

#[inline]
fn create_error(message: &str, code: ErrorCode) -> MailStashError {
    MailStashError::Generic {
        message: message.into(),
        location: snafu::Location::default(),
        code,
    }
}

#[inline]
pub fn create_api_error_response(message: &str, code: ErrorCode) -> Error {
    create_error(message, code).into()
}

impl ResponseError for MailStashError {
    fn status(&self) -> StatusCode {
        match self {
            MailStashError::Generic { code, .. } => code.status(),
        }
    }

    fn as_response(&self) -> Response
    where
        Self: std::error::Error + Send + Sync + 'static,
    {
        match self {
            MailStashError::Generic {
                message,
                location,
                code,
            } => {
                error!(
                    error_code = *code as u32,
                    error_message = %message,
                    error_location = ?location
                );

                let body = Body::from_json(serde_json::json!({
                    "code": *code as u32,
                    "message": message.to_string(),
                }))
                .unwrap();

                Response::builder().status(self.status()).body(body)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_name_and_address() {
        let addr = Addr::parse("John Doe <john@example.com>");
        assert_eq!(addr.name.as_deref(), Some("John Doe"));
        assert_eq!(addr.address.as_deref(), Some("john@example.com"));
        assert_eq!(addr.render(), "\"John Doe\" <john@example.com>");
    }

    #[test]
    fn parse_bare_address() {
        let addr = Addr::parse("  jane@example.com ");
        assert_eq!(addr.name, None);
        assert_eq!(addr.render(), "jane@example.com");
    }

    #[test]
    fn parse_empty_renders_empty() {
        assert_eq!(Addr::parse("   ").render(), "");
    }
}
