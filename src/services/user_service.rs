use crate::models::user::User;
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use crate::services::password::{self, PasswordError};
use crate::services::validation::{self, ValidationError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("User not found")]
    UserNotFound,
    #[error("Email already exists")]
    EmailTaken,
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Only compared against `password` when the form sent one.
    pub password_confirm: Option<String>,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_name(&self.name)?;
        validation::validate_email(self.email.trim())?;
        validation::validate_password(&self.password, self.password_confirm.as_deref())
    }
}

pub struct UpdatePasswordRequest {
    pub user_id: i64,
    pub new_password: String,
    pub new_password_confirm: Option<String>,
}

pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    pub async fn create_user(&self, request: SignupRequest) -> Result<User, UserServiceError> {
        request.validate()?;

        let name = request.name.trim();
        let email = request.email.trim();

        if self.repository.find_by_email(email).await?.is_some() {
            return Err(UserServiceError::EmailTaken);
        }

        let password_hash = password::hash_password(&request.password).await?;

        // The existence check above can race another signup; the unique index decides.
        match self
            .repository
            .create_user(name, email, &password_hash)
            .await
        {
            Ok(user) => {
                tracing::info!(user_id = user.id, "User registered");
                Ok(user)
            }
            Err(RepositoryError::AlreadyExists) => Err(UserServiceError::EmailTaken),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_email(email.trim()).await?)
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<User>, UserServiceError> {
        Ok(self.repository.list_users(limit, offset).await?)
    }

    pub async fn update_password(
        &self,
        request: UpdatePasswordRequest,
    ) -> Result<(), UserServiceError> {
        validation::validate_password(
            &request.new_password,
            request.new_password_confirm.as_deref(),
        )?;

        let password_hash = password::hash_password(&request.new_password).await?;

        match self
            .repository
            .update_password(request.user_id, &password_hash)
            .await
        {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }
}
