//! Argon2 hashing, run on the blocking pool so a slow hash never stalls
//! the request workers.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use once_cell::sync::Lazy;
use tokio::task::spawn_blocking;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Verified in place of a real hash when the account does not exist, so that
/// unknown emails cost as much as wrong passwords.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password_blocking("minauth-timing-equaliser").ok());

pub async fn hash_password(password: &str) -> Result<String, PasswordError> {
    let password = password.to_owned();
    spawn_blocking(move || hash_password_blocking(&password)).await?
}

pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, PasswordError> {
    let password = password.to_owned();
    let password_hash = password_hash.to_owned();
    Ok(spawn_blocking(move || verify_password_blocking(&password, &password_hash)).await?)
}

/// Burns one verification against a throwaway hash. The result is always `false`.
pub async fn verify_dummy(password: &str) -> Result<bool, PasswordError> {
    let password = password.to_owned();
    spawn_blocking(move || {
        if let Some(hash) = DUMMY_HASH.as_deref() {
            let _ = verify_password_blocking(&password, hash);
        }
    })
    .await?;
    Ok(false)
}

pub fn hash_password_blocking(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

pub fn verify_password_blocking(password: &str, password_hash: &str) -> bool {
    if let Ok(parsed_hash) = PasswordHash::new(password_hash) {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    } else {
        false
    }
}
