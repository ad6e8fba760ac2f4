//! Per-request view of the session: who is signed in, and the one-shot
//! status messages queued for the next rendered page.

use crate::error::AppError;
use crate::models::user::SessionUser;
use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

pub const USER_KEY: &str = "user";
pub const FLASH_KEY: &str = "flash";

/// Extracted by every page handler in place of a bare `Session`.
#[derive(Clone, Debug)]
pub struct RequestContext {
    session: Session,
    user: Option<SessionUser>,
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::SessionMissing(msg))?;
        Self::load(session).await
    }
}

impl RequestContext {
    pub async fn load(session: Session) -> Result<Self, AppError> {
        let user = session.get::<SessionUser>(USER_KEY).await?;
        Ok(Self { session, user })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    /// Attaches `user` to the session under a fresh session id.
    pub async fn sign_in(&mut self, user: SessionUser) -> Result<(), AppError> {
        self.session.cycle_id().await?;
        self.session.insert(USER_KEY, &user).await?;
        self.user = Some(user);
        Ok(())
    }

    /// Drops the whole server-side session, identity and pending messages alike.
    pub async fn sign_out(&mut self) -> Result<(), AppError> {
        self.session.flush().await?;
        self.user = None;
        Ok(())
    }

    /// Queues a message for the next page that renders flash output.
    pub async fn flash(&self, message: impl Into<String>) -> Result<(), AppError> {
        let mut queued: Vec<String> = self.session.get(FLASH_KEY).await?.unwrap_or_default();
        queued.push(message.into());
        self.session.insert(FLASH_KEY, queued).await?;
        Ok(())
    }

    /// Removes every queued message and returns the first one.
    pub async fn take_flash(&self) -> Result<Option<String>, AppError> {
        let queued: Option<Vec<String>> = self.session.remove(FLASH_KEY).await?;
        Ok(queued.and_then(|messages| messages.into_iter().next()))
    }
}
