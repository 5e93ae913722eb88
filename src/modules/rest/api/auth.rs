// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use poem_openapi::{payload::Json, Object, OpenApi};
use serde::{Deserialize, Serialize};

use crate::modules::error::code::ErrorCode;
use crate::modules::rest::api::ApiTags;
use crate::modules::rest::ApiResult;
use crate::modules::settings::cli::SETTINGS;
use crate::modules::user::entity::User;
use crate::modules::user::jwt::issue_access_token;
use crate::modules::user::refresh::RefreshTokenEntity;
use crate::raise_error;

#[derive(Clone, Debug, Serialize, Deserialize, Object)]
pub struct SignupRequest {
    #[oai(validator(custom = "crate::modules::common::validator::EmailValidator"))]
    pub email: String,
    #[oai(validator(min_length = 8))]
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Object)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Object)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Object)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds
    pub expires_in: u64,
}

pub struct AuthApi;

#[OpenApi(prefix_path = "/api/v1", tag = "ApiTags::Auth")]
impl AuthApi {
    /// Create a local user
    #[oai(path = "/auth/signup", method = "post", operation_id = "signup")]
    async fn signup(&self, payload: Json<SignupRequest>) -> ApiResult<Json<User>> {
        if User::find_by_email(&payload.email).await?.is_some() {
            return Err(raise_error!(
                "A user with this email already exists".into(),
                ErrorCode::AlreadyExists
            )
            .into());
        }
        let user = User::signup(&payload.email, &payload.password)?;
        user.save().await?;
        Ok(Json(user))
    }

    /// Exchange credentials for an access/refresh token pair
    #[oai(path = "/auth/login", method = "post", operation_id = "login")]
    async fn login(&self, payload: Json<LoginRequest>) -> ApiResult<Json<TokenPair>> {
        let user = User::find_by_email(&payload.email).await?.ok_or_else(|| {
            raise_error!(
                "Invalid email or password".into(),
                ErrorCode::PermissionDenied
            )
        })?;
        user.verify_password(&payload.password)?;

        let access_token = issue_access_token(user.id)?;
        let refresh_token = RefreshTokenEntity::issue(user.id).await?;
        Ok(Json(TokenPair {
            access_token,
            refresh_token,
            expires_in: SETTINGS.mailstash_jwt_expiry_secs,
        }))
    }

    /// Rotate a refresh token; the presented token is single-use
    #[oai(path = "/auth/refresh", method = "post", operation_id = "refresh_token")]
    async fn refresh(&self, payload: Json<RefreshRequest>) -> ApiResult<Json<TokenPair>> {
        let (refresh_token, user_id) = RefreshTokenEntity::rotate(&payload.refresh_token).await?;
        let access_token = issue_access_token(user_id)?;
        Ok(Json(TokenPair {
            access_token,
            refresh_token,
            expires_in: SETTINGS.mailstash_jwt_expiry_secs,
        }))
    }

    /// Revoke a refresh token
    #[oai(path = "/auth/logout", method = "post", operation_id = "logout")]
    async fn logout(&self, payload: Json<RefreshRequest>) -> ApiResult<()> {
        RefreshTokenEntity::revoke(&payload.refresh_token).await?;
        Ok(())
    }
}
