// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use native_db::*;
use native_model::{native_model, Model};
use poem_openapi::Object;
use scrypt::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use scrypt::Scrypt;
use serde::{Deserialize, Serialize};

use crate::{
    id,
    modules::{
        database::{insert_impl, manager::DB_MANAGER, secondary_find_impl},
        error::{code::ErrorCode, MailStashResult},
    },
    raise_error, utc_now, validate_email,
};

/// A local user. The password hash is for login only; upstream mailbox
/// credentials never go through hashing (they live in the vault).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, Object)]
#[native_model(id = 2, version = 1)]
#[native_db(primary_key(pk -> String))]
pub struct User {
    #[secondary_key(unique)]
    pub id: u64,
    #[secondary_key(unique)]
    pub email: String,
    #[oai(skip)]
    pub password_hash: Option<String>,
    /// External identity-provider subject, when signup came through OAuth
    pub external_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    fn pk(&self) -> String {
        format!("{}_{}", self.created_at, self.id)
    }

    pub fn signup(email: &str, password: &str) -> MailStashResult<Self> {
        validate_email!(email)?;
        if password.len() < 8 {
            return Err(raise_error!(
                "Password must be at least 8 characters".into(),
                ErrorCode::InvalidParameter
            ));
        }
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Scrypt
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
            .to_string();
        Ok(Self {
            id: id!(64),
            email: email.to_lowercase(),
            password_hash: Some(password_hash),
            external_id: None,
            created_at: utc_now!(),
            updated_at: utc_now!(),
        })
    }

    pub fn verify_password(&self, password: &str) -> MailStashResult<()> {
        let stored = self.password_hash.as_deref().ok_or_else(|| {
            raise_error!(
                "This user has no local password; sign in through the identity provider".into(),
                ErrorCode::PermissionDenied
            )
        })?;
        let parsed = PasswordHash::new(stored)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Scrypt
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| {
                raise_error!(
                    "Invalid email or password".into(),
                    ErrorCode::PermissionDenied
                )
            })
    }

    pub async fn save(&self) -> MailStashResult<()> {
        insert_impl(DB_MANAGER.meta_db(), self.to_owned()).await
    }

    pub async fn find(user_id: u64) -> MailStashResult<Option<User>> {
        secondary_find_impl(DB_MANAGER.meta_db(), UserKey::id, user_id).await
    }

    pub async fn get(user_id: u64) -> MailStashResult<User> {
        Self::find(user_id).await?.ok_or_else(|| {
            raise_error!(
                format!("User with id '{user_id}' not found"),
                ErrorCode::ResourceNotFound
            )
        })
    }

    pub async fn find_by_email(email: &str) -> MailStashResult<Option<User>> {
        secondary_find_impl(DB_MANAGER.meta_db(), UserKey::email, email.to_lowercase()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_and_rejects() {
        let user = User::signup("who@example.com", "correct-horse").unwrap();
        assert!(user.verify_password("correct-horse").is_ok());
        assert!(user.verify_password("battery-staple").is_err());
        // the hash is not the password
        assert_ne!(user.password_hash.as_deref(), Some("correct-horse"));
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(User::signup("who@example.com", "short").is_err());
    }

    #[tokio::test]
    async fn email_is_unique() {
        let first = User::signup("unique@example.com", "longpassword").unwrap();
        first.save().await.unwrap();
        let second = User::signup("unique@example.com", "longpassword").unwrap();
        assert!(second.save().await.is_err());
    }
}
