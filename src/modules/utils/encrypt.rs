// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::aead::{Aad, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};

use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailStashResult;
use crate::modules::settings::cli::SETTINGS;
use crate::raise_error;

const SALT_LEN: usize = 16;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

struct SingleNonceSequence([u8; IV_LEN]);

impl SingleNonceSequence {
    fn new(nonce: [u8; IV_LEN]) -> Self {
        SingleNonceSequence(nonce)
    }
}

impl NonceSequence for SingleNonceSequence {
    fn advance(&mut self) -> Result<Nonce, ring::error::Unspecified> {
        Ok(Nonce::assume_unique_for_key(self.0))
    }
}

/// Encrypts an upstream app password with the process master key.
/// Output layout: `base64(salt):base64(iv):base64(tag):base64(ct)`.
pub fn encrypt_credential(plaintext: &str) -> MailStashResult<String> {
    internal_encrypt(&SETTINGS.mailstash_encryption_key, plaintext)
        .map_err(|_| raise_error!("Failed to encrypt credential.".into(), ErrorCode::InternalError))
}

/// Decrypts a vault ciphertext. A mangled segment or failed tag check
/// yields `CredentialTampered` rather than garbage plaintext.
pub fn decrypt_credential(data: &str) -> MailStashResult<String> {
    internal_decrypt(&SETTINGS.mailstash_encryption_key, data).map_err(|_| {
        raise_error!(
            "Credential decryption failed: wrong encryption key or tampered ciphertext".into(),
            ErrorCode::CredentialTampered
        )
    })
}

fn derive_key(master_secret: &str, salt: &[u8]) -> Result<[u8; 32], ring::error::Unspecified> {
    let params = scrypt::Params::new(15, 8, 1, 32).map_err(|_| ring::error::Unspecified)?;
    let mut key = [0u8; 32];
    scrypt::scrypt(master_secret.as_bytes(), salt, &params, &mut key)
        .map_err(|_| ring::error::Unspecified)?;
    Ok(key)
}

fn internal_encrypt(
    master_secret: &str,
    plaintext: &str,
) -> Result<String, ring::error::Unspecified> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)?;
    let mut iv = [0u8; IV_LEN];
    rng.fill(&mut iv)?;

    let key = derive_key(master_secret, &salt)?;
    let unbound_key = ring::aead::UnboundKey::new(&AES_256_GCM, &key)?;
    let mut sealing_key = SealingKey::new(unbound_key, SingleNonceSequence::new(iv));

    let mut in_out = plaintext.as_bytes().to_vec();
    sealing_key.seal_in_place_append_tag(Aad::empty(), &mut in_out)?;

    // seal appends the tag to the ciphertext; split it into its own segment
    let tag_offset = in_out.len() - TAG_LEN;
    let (ciphertext, tag) = in_out.split_at(tag_offset);

    Ok([
        STANDARD.encode(salt),
        STANDARD.encode(iv),
        STANDARD.encode(tag),
        STANDARD.encode(ciphertext),
    ]
    .join(":"))
}

fn internal_decrypt(master_secret: &str, data: &str) -> Result<String, ring::error::Unspecified> {
    let segments: Vec<&str> = data.split(':').collect();
    if segments.len() != 4 {
        return Err(ring::error::Unspecified);
    }
    let decode = |segment: &str| {
        STANDARD
            .decode(segment)
            .map_err(|_| ring::error::Unspecified)
    };
    let salt = decode(segments[0])?;
    let iv_bytes = decode(segments[1])?;
    let tag = decode(segments[2])?;
    let ciphertext = decode(segments[3])?;
    if salt.len() != SALT_LEN || iv_bytes.len() != IV_LEN || tag.len() != TAG_LEN {
        return Err(ring::error::Unspecified);
    }
    let iv: [u8; IV_LEN] = iv_bytes.try_into().map_err(|_| ring::error::Unspecified)?;

    let key = derive_key(master_secret, &salt)?;
    let unbound_key = ring::aead::UnboundKey::new(&AES_256_GCM, &key)?;
    let mut opening_key = OpeningKey::new(unbound_key, SingleNonceSequence::new(iv));

    let mut in_out = ciphertext;
    in_out.extend_from_slice(&tag);
    let decrypted = opening_key.open_in_place(Aad::empty(), &mut in_out)?;
    String::from_utf8(decrypted.to_vec()).map_err(|_| ring::error::Unspecified)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = "x".repeat(32);
        let encrypted = internal_encrypt(&key, "hello:world").unwrap();
        assert_eq!(encrypted.split(':').count(), 4);
        let decrypted = internal_decrypt(&key, &encrypted).unwrap();
        assert_eq!(decrypted, "hello:world");
    }

    #[test]
    fn roundtrip_preserves_utf8() {
        let key = "k".repeat(40);
        for plaintext in ["", "app-password-1234", "пароль", "密码🔒"] {
            let encrypted = internal_encrypt(&key, plaintext).unwrap();
            assert_eq!(internal_decrypt(&key, &encrypted).unwrap(), plaintext);
        }
    }

    #[test]
    fn ciphertexts_are_salted_per_call() {
        let key = "x".repeat(32);
        let a = internal_encrypt(&key, "same input").unwrap();
        let b = internal_encrypt(&key, "same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let key = "x".repeat(32);
        let encrypted = internal_encrypt(&key, "hello:world").unwrap();
        // flip one byte inside the ciphertext segment
        let mut segments: Vec<String> = encrypted.split(':').map(String::from).collect();
        let mut ct = STANDARD.decode(&segments[3]).unwrap();
        ct[0] ^= 0x01;
        segments[3] = STANDARD.encode(&ct);
        assert!(internal_decrypt(&key, &segments.join(":")).is_err());
    }

    #[test]
    fn wrong_key_is_rejected() {
        let encrypted = internal_encrypt(&"x".repeat(32), "hello:world").unwrap();
        assert!(internal_decrypt(&"y".repeat(32), &encrypted).is_err());
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert!(internal_decrypt(&"x".repeat(32), "not-a-vault-string").is_err());
        assert!(internal_decrypt(&"x".repeat(32), "a:b:c").is_err());
    }
}
