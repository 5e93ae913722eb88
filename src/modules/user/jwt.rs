// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::hmac;
use serde::{Deserialize, Serialize};

use crate::{
    modules::{
        error::{code::ErrorCode, MailStashResult},
        settings::cli::SETTINGS,
    },
    raise_error, utc_now,
};

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: u64,
    iat: i64,
    exp: i64,
}

fn signing_key() -> hmac::Key {
    hmac::Key::new(
        hmac::HMAC_SHA256,
        SETTINGS.mailstash_jwt_secret.as_bytes(),
    )
}

/// Issues a compact HS256 JWT for the user, expiring after the configured
/// access-token lifetime.
pub fn issue_access_token(user_id: u64) -> MailStashResult<String> {
    let now = utc_now!() / 1000;
    let claims = Claims {
        sub: user_id,
        iat: now,
        exp: now + SETTINGS.mailstash_jwt_expiry_secs as i64,
    };
    let payload = serde_json::to_string(&claims)
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(HEADER),
        URL_SAFE_NO_PAD.encode(payload)
    );
    let signature = hmac::sign(&signing_key(), signing_input.as_bytes());
    Ok(format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature.as_ref())
    ))
}

/// Verifies signature and expiry; returns the authenticated user id.
pub fn verify_access_token(token: &str) -> MailStashResult<u64> {
    let invalid = || raise_error!("Invalid access token".into(), ErrorCode::PermissionDenied);

    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(invalid());
    };

    let signing_input = format!("{}.{}", header, payload);
    let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;
    hmac::verify(&signing_key(), signing_input.as_bytes(), &signature).map_err(|_| invalid())?;

    let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| invalid())?;
    let claims: Claims = serde_json::from_slice(&payload).map_err(|_| invalid())?;
    if claims.exp <= utc_now!() / 1000 {
        return Err(raise_error!(
            "Access token has expired".into(),
            ErrorCode::PermissionDenied
        ));
    }
    Ok(claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_yields_the_user_id() {
        let token = issue_access_token(42).unwrap();
        assert_eq!(verify_access_token(&token).unwrap(), 42);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = issue_access_token(42).unwrap();
        let mut segments: Vec<String> = token.split('.').map(String::from).collect();
        let claims = format!(
            "{{\"sub\":43,\"iat\":0,\"exp\":{}}}",
            utc_now!() / 1000 + 600
        );
        segments[1] = URL_SAFE_NO_PAD.encode(claims);
        assert!(verify_access_token(&segments.join(".")).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify_access_token("not-a-jwt").is_err());
        assert!(verify_access_token("a.b").is_err());
        assert!(verify_access_token("a.b.c.d").is_err());
    }
}
