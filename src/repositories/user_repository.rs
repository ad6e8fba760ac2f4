use crate::models::user::User;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("User not found")]
    NotFound,
    #[error("User already exists")]
    AlreadyExists,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> RepositoryResult<User>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;
    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()>;
    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>>;
    /// Stores a reset token digest, replacing any outstanding one.
    async fn set_reset_token(
        &self,
        id: i64,
        token_digest: &str,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<()>;
    /// Withdraws any outstanding reset token for `id`.
    async fn clear_reset_token(&self, id: i64) -> RepositoryResult<()>;
    /// Finds the user holding an unexpired reset token. An empty digest never matches.
    async fn find_by_reset_token(
        &self,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<User>>;
    /// Swaps in a new password hash and clears the token in one statement.
    /// Returns `false` when no user holds an unexpired token with this digest.
    async fn consume_reset_token(
        &self,
        token_digest: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool>;
}

/// Fixed-width UTC timestamps so that string comparison in SQL orders correctly.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, reset_token, reset_token_expires_at, created_at";

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> RepositoryResult<User> {
        let result = sqlx::query("INSERT INTO users (name, email, password_hash) VALUES (?, ?, ?)")
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .execute(&self.pool)
            .await;

        match result {
            Ok(res) => {
                let id = res.last_insert_rowid();
                self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
            }
            Err(e) => {
                let unique_violation = e
                    .as_database_error()
                    .is_some_and(|db_err| db_err.is_unique_violation());
                if unique_violation {
                    Err(RepositoryError::AlreadyExists)
                } else {
                    Err(RepositoryError::Database(e))
                }
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>> {
        let limit = limit.unwrap_or(100);
        let offset = offset.unwrap_or(0);

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id ASC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn set_reset_token(
        &self,
        id: i64,
        token_digest: &str,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE users SET reset_token = ?, reset_token_expires_at = ? WHERE id = ?",
        )
        .bind(token_digest)
        .bind(format_timestamp(expires_at))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn clear_reset_token(&self, id: i64) -> RepositoryResult<()> {
        sqlx::query(
            "UPDATE users SET reset_token = NULL, reset_token_expires_at = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<User>> {
        if token_digest.is_empty() {
            return Ok(None);
        }

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE reset_token IS NOT NULL
              AND reset_token = ?
              AND reset_token_expires_at > ?
            "#
        ))
        .bind(token_digest)
        .bind(format_timestamp(now))
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn consume_reset_token(
        &self,
        token_digest: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        if token_digest.is_empty() {
            return Ok(false);
        }

        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, reset_token = NULL, reset_token_expires_at = NULL
            WHERE reset_token IS NOT NULL
              AND reset_token = ?
              AND reset_token_expires_at > ?
            "#,
        )
        .bind(password_hash)
        .bind(token_digest)
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
