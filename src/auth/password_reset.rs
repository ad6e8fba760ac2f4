use crate::auth::handlers::redirect_with_flash;
use crate::auth::{messages, RequestContext};
use crate::error::AppError;
use crate::middleware::csrf::{get_or_create_csrf_token, validate_csrf_form_field};
use crate::services::password_reset_service::{PasswordResetError, ResetPasswordRequest};
use crate::services::validation::ValidationError;
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

#[derive(Template, WebTemplate)]
#[template(path = "forgot_password.html")]
pub struct ForgotPasswordTemplate {
    message: Option<String>,
    csrf_token: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "reset_password.html")]
pub struct ResetPasswordTemplate {
    message: Option<String>,
    csrf_token: String,
    token: String,
    token_valid: bool,
}

#[derive(Deserialize)]
pub struct ForgotPasswordForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordQuery {
    token: Option<String>,
}

#[derive(Deserialize)]
pub struct ResetPasswordForm {
    #[serde(default)]
    token: String,
    #[serde(default)]
    password: String,
    #[serde(default, alias = "confirmPassword")]
    confirm_password: String,
    #[serde(default)]
    csrf_token: String,
}

fn reset_page_url(token: &str) -> String {
    format!("/reset-password?token={}", urlencoding::encode(token))
}

pub async fn forgot_password_page(ctx: RequestContext) -> Result<ForgotPasswordTemplate, AppError> {
    let message = ctx.take_flash().await?;
    let csrf_token = get_or_create_csrf_token(ctx.session()).await?;
    Ok(ForgotPasswordTemplate {
        message,
        csrf_token,
    })
}

pub async fn forgot_password_handler(
    State(app_state): State<AppState>,
    ctx: RequestContext,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Response, AppError> {
    if validate_csrf_form_field(ctx.session(), &form.csrf_token)
        .await
        .is_err()
    {
        return redirect_with_flash(&ctx, "/forgot-password", messages::INVALID_CSRF).await;
    }

    let message = match app_state
        .password_reset_service
        .request_reset(&form.email)
        .await
    {
        Ok(_) => messages::RESET_EMAIL_SENT,
        Err(PasswordResetError::UserNotFound) => messages::NO_SUCH_EMAIL,
        Err(err) => {
            tracing::error!("Password reset request failed: {}", err);
            messages::GENERIC_ERROR
        }
    };

    redirect_with_flash(&ctx, "/forgot-password", message).await
}

pub async fn reset_password_page(
    State(app_state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ResetPasswordQuery>,
) -> Result<ResetPasswordTemplate, AppError> {
    let token = query.token.unwrap_or_default();

    let token_valid = match app_state
        .password_reset_service
        .token_is_pending(&token)
        .await
    {
        Ok(valid) => valid,
        Err(err) => {
            tracing::error!("Could not check reset token: {}", err);
            false
        }
    };

    Ok(ResetPasswordTemplate {
        message: ctx.take_flash().await?,
        csrf_token: get_or_create_csrf_token(ctx.session()).await?,
        token,
        token_valid,
    })
}

pub async fn reset_password_handler(
    State(app_state): State<AppState>,
    ctx: RequestContext,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response, AppError> {
    let back = reset_page_url(&form.token);

    if validate_csrf_form_field(ctx.session(), &form.csrf_token)
        .await
        .is_err()
    {
        return redirect_with_flash(&ctx, &back, messages::INVALID_CSRF).await;
    }

    let request = ResetPasswordRequest {
        token: form.token,
        password: form.password,
        password_confirm: form.confirm_password,
    };

    match app_state.password_reset_service.reset_password(request).await {
        Ok(()) => {
            ctx.flash(messages::RESET_SUCCEEDED).await?;
            Ok(Redirect::to("/login").into_response())
        }
        Err(PasswordResetError::Validation(ValidationError::PasswordMismatch)) => {
            redirect_with_flash(&ctx, &back, messages::PASSWORDS_DIFFER).await
        }
        Err(PasswordResetError::Validation(err)) => {
            redirect_with_flash(&ctx, &back, &err.to_string()).await
        }
        Err(PasswordResetError::InvalidToken) => {
            redirect_with_flash(&ctx, &back, messages::RESET_FAILED).await
        }
        Err(err) => {
            tracing::error!("Password reset failed: {}", err);
            redirect_with_flash(&ctx, &back, messages::RESET_FAILED).await
        }
    }
}
