use crate::repositories::user_repository::{RepositoryError, UserRepository};
use crate::services::email_service::{EmailError, EmailService};
use crate::services::password::{self, PasswordError};
use crate::services::validation::{self, ValidationError};
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PasswordResetError {
    #[error("No user with that email address found")]
    UserNotFound,
    #[error("Reset token is invalid or expired")]
    InvalidToken,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error("Email error: {0}")]
    EmailError(#[from] EmailError),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_password(&self.password, Some(&self.password_confirm))
    }
}

pub struct PasswordResetService {
    user_repository: Arc<dyn UserRepository>,
    email_service: Box<dyn EmailService>,
    token_ttl: Duration,
}

impl PasswordResetService {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        email_service: Box<dyn EmailService>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            user_repository,
            email_service,
            token_ttl,
        }
    }

    fn generate_token() -> String {
        let mut rng = rand::thread_rng();
        let bytes: [u8; 32] = rng.gen();
        hex::encode(bytes)
    }

    /// Only the digest is stored, so a leaked table does not leak usable links.
    pub fn token_digest(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }

    /// Issues a fresh token for `email`, replacing any outstanding one, and mails it.
    /// Returns the raw token.
    pub async fn request_reset(&self, email: &str) -> Result<String, PasswordResetError> {
        let user = self
            .user_repository
            .find_by_email(email.trim())
            .await?
            .ok_or(PasswordResetError::UserNotFound)?;

        let token = Self::generate_token();
        let expires_at = Utc::now() + self.token_ttl;

        self.user_repository
            .set_reset_token(user.id, &Self::token_digest(&token), expires_at)
            .await?;

        match self
            .email_service
            .send_password_reset_email(&user.email, &user.name, &token)
            .await
        {
            Ok(()) => {
                tracing::info!(user_id = user.id, "Password reset email sent");
                Ok(token)
            }
            Err(e) => {
                tracing::error!(user_id = user.id, "Failed to send password reset email: {}", e);
                // An undelivered token must not stay usable.
                if let Err(clear_err) = self.user_repository.clear_reset_token(user.id).await {
                    tracing::error!(user_id = user.id, "Failed to withdraw reset token: {}", clear_err);
                }
                Err(e.into())
            }
        }
    }

    /// Whether `token` currently identifies a pending reset.
    pub async fn token_is_pending(&self, token: &str) -> Result<bool, PasswordResetError> {
        if token.is_empty() {
            return Ok(false);
        }
        let user = self
            .user_repository
            .find_by_reset_token(&Self::token_digest(token), Utc::now())
            .await?;
        Ok(user.is_some())
    }

    pub async fn reset_password(
        &self,
        request: ResetPasswordRequest,
    ) -> Result<(), PasswordResetError> {
        request.validate()?;

        if request.token.is_empty() {
            return Err(PasswordResetError::InvalidToken);
        }

        let password_hash = password::hash_password(&request.password).await?;

        let consumed = self
            .user_repository
            .consume_reset_token(
                &Self::token_digest(&request.token),
                &password_hash,
                Utc::now(),
            )
            .await?;

        if !consumed {
            return Err(PasswordResetError::InvalidToken);
        }

        tracing::info!("Password reset completed");
        Ok(())
    }
}
