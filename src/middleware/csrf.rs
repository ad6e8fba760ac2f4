use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, warn};
use uuid::Uuid;

const CSRF_TOKEN_KEY: &str = "csrf_token";

/// Token lifetime in seconds (24 hours).
const CSRF_TOKEN_TTL: i64 = 86400;

/// CSRF Token structure for session storage
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CsrfToken {
    value: String,
    created_at: i64,
}

impl CsrfToken {
    fn new() -> Self {
        Self {
            value: Uuid::new_v4().simple().to_string(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() - self.created_at > CSRF_TOKEN_TTL
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CsrfError {
    #[error("No CSRF token in session")]
    Missing,
    #[error("CSRF token expired")]
    Expired,
    #[error("CSRF token mismatch")]
    Mismatch,
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Generate a new CSRF token and store in session
async fn generate_csrf_token(
    session: &Session,
) -> Result<String, tower_sessions::session::Error> {
    let token = CsrfToken::new();
    let value = token.value.clone();

    session.insert(CSRF_TOKEN_KEY, token).await?;

    debug!("Generated new CSRF token");
    Ok(value)
}

/// Get or create a CSRF token for the session
pub async fn get_or_create_csrf_token(
    session: &Session,
) -> Result<String, tower_sessions::session::Error> {
    let token: Option<CsrfToken> = session.get(CSRF_TOKEN_KEY).await?;

    match token {
        Some(existing_token) if !existing_token.is_expired() => Ok(existing_token.value),
        _ => generate_csrf_token(session).await,
    }
}

/// Checks a submitted form token against the session and rotates it on success.
pub async fn validate_csrf_form_field(session: &Session, form_token: &str) -> Result<(), CsrfError> {
    let stored_token: CsrfToken = session.get(CSRF_TOKEN_KEY).await?.ok_or_else(|| {
        warn!("No CSRF token in session for form validation");
        CsrfError::Missing
    })?;

    if stored_token.is_expired() {
        warn!("CSRF token expired during form validation");
        return Err(CsrfError::Expired);
    }

    if !constant_time_eq(form_token.as_bytes(), stored_token.value.as_bytes()) {
        warn!("CSRF form token mismatch");
        return Err(CsrfError::Mismatch);
    }

    // Token is valid - regenerate for next request (replay protection)
    generate_csrf_token(session).await?;

    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
