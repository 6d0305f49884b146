//! Password hashing
//!
//! Stored credentials are argon2 PHC strings (`$argon2id$v=19$...`). Hashing
//! and verification are CPU bound and run on the blocking pool.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use std::sync::OnceLock;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Credential verified for accounts that do not exist
static PLACEHOLDER_HASH: OnceLock<Option<String>> = OnceLock::new();

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("password task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Hash `password` with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);

    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordError::Hash(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Check a claimed password against a stored credential.
///
/// A stored value that is not a PHC string only matches when
/// `legacy_plaintext` is set, and is then compared in constant time.
pub fn verify_password(claimed: &str, stored: &str, legacy_plaintext: bool) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(claimed.as_bytes(), &parsed)
            .is_ok(),
        Err(_) if legacy_plaintext => claimed.as_bytes().ct_eq(stored.as_bytes()).into(),
        Err(_) => false,
    }
}

pub async fn hash_in_background(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

pub async fn verify_in_background(
    claimed: String,
    stored: String,
    legacy_plaintext: bool,
) -> Result<bool, PasswordError> {
    Ok(tokio::task::spawn_blocking(move || {
        verify_password(&claimed, &stored, legacy_plaintext)
    })
    .await?)
}

fn placeholder_hash() -> Option<&'static str> {
    PLACEHOLDER_HASH
        .get_or_init(|| hash_password("placeholder-credential").ok())
        .as_deref()
}

/// Spend one argon2 verification on a missing account.
///
/// Sign-in for an unknown email then takes as long as for a known one.
pub async fn verify_missing_in_background(claimed: String) -> Result<(), PasswordError> {
    tokio::task::spawn_blocking(move || {
        if let Some(stored) = placeholder_hash() {
            let _ = verify_password(&claimed, stored, false);
        }
    })
    .await?;
    Ok(())
}
