use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

/// Failures that leave no way to answer with a redirect and a flash message.
/// Everything a user can act on is reported through the flash instead.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Session unavailable: {0}")]
    SessionMissing(&'static str),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {}", self);

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html("<html><body><h1>Something went wrong</h1><p>Please try again later.</p></body></html>"),
        )
            .into_response()
    }
}
