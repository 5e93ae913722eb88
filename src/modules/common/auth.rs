// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use poem::{
    web::headers::{authorization::Bearer, Authorization, HeaderMapExt},
    FromRequest, Request, RequestBody, Result,
};

use crate::modules::{
    error::code::ErrorCode,
    user::jwt::verify_access_token,
};

use super::create_api_error_response;

/// The authenticated caller. Every sync-facing route resolves this from the
/// Bearer token before touching user-owned data.
#[derive(Clone, Debug)]
pub struct UserContext {
    pub user_id: u64,
}

impl<'a> FromRequest<'a> for UserContext {
    async fn from_request(req: &'a Request, _body: &mut RequestBody) -> Result<Self> {
        let bearer = req
            .headers()
            .typed_get::<Authorization<Bearer>>()
            .map(|auth| auth.0.token().to_string())
            .ok_or_else(|| {
                create_api_error_response(
                    "Missing Authorization bearer token",
                    ErrorCode::PermissionDenied,
                )
            })?;

        let user_id = verify_access_token(&bearer).map_err(|error| {
            create_api_error_response(&error.to_string(), ErrorCode::PermissionDenied)
        })?;

        Ok(UserContext { user_id })
    }
}
