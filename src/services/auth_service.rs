use crate::models::user::User;
use crate::repositories::user_repository::UserRepository;
use crate::services::password::{self, PasswordError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    /// Covers both unknown email and wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] crate::repositories::user_repository::RepositoryError),
}

pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub struct AuthService {
    user_repository: Arc<dyn UserRepository>,
}

impl AuthService {
    pub fn new(user_repository: Arc<dyn UserRepository>) -> Self {
        Self { user_repository }
    }

    pub async fn authenticate(&self, request: LoginRequest) -> Result<User, AuthServiceError> {
        let Some(user) = self
            .user_repository
            .find_by_email(request.email.trim())
            .await?
        else {
            password::verify_dummy(&request.password).await?;
            tracing::debug!("Login attempt for unknown email");
            return Err(AuthServiceError::InvalidCredentials);
        };

        if !password::verify_password(&request.password, &user.password_hash).await? {
            tracing::debug!(user_id = user.id, "Login attempt with wrong password");
            return Err(AuthServiceError::InvalidCredentials);
        }

        Ok(user)
    }
}
