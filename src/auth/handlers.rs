use crate::auth::{messages, RequestContext};
use crate::error::AppError;
use crate::handlers::pages::IndexTemplate;
use crate::middleware::csrf::{get_or_create_csrf_token, validate_csrf_form_field};
use crate::models::user::SessionUser;
use crate::services::{
    auth_service::{AuthServiceError, LoginRequest},
    user_service::{SignupRequest, UserServiceError},
};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

#[derive(Template, WebTemplate)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    message: Option<String>,
    csrf_token: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    message: Option<String>,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default, alias = "confirmpassword")]
    confirm_password: Option<String>,
    #[serde(default)]
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct LogoutForm {
    #[serde(default)]
    csrf_token: String,
}

/// Queues `message` and sends the browser back to `to`.
pub(crate) async fn redirect_with_flash(
    ctx: &RequestContext,
    to: &str,
    message: &str,
) -> Result<Response, AppError> {
    ctx.flash(message).await?;
    Ok(Redirect::to(to).into_response())
}

pub async fn signup_page(ctx: RequestContext) -> Result<SignupTemplate, AppError> {
    let message = ctx.take_flash().await?;
    let csrf_token = get_or_create_csrf_token(ctx.session()).await?;
    Ok(SignupTemplate {
        message,
        csrf_token,
    })
}

pub async fn signup_handler(
    State(app_state): State<AppState>,
    mut ctx: RequestContext,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    if validate_csrf_form_field(ctx.session(), &form.csrf_token)
        .await
        .is_err()
    {
        return redirect_with_flash(&ctx, "/signup", messages::INVALID_CSRF).await;
    }

    let request = SignupRequest {
        name: form.name,
        email: form.email,
        password: form.password,
        password_confirm: form.confirm_password.filter(|confirm| !confirm.is_empty()),
    };

    match app_state.user_service.create_user(request).await {
        Ok(user) => {
            ctx.sign_in(SessionUser::from(&user)).await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(UserServiceError::EmailTaken) => {
            redirect_with_flash(&ctx, "/signup", messages::EMAIL_TAKEN).await
        }
        Err(UserServiceError::Validation(err)) => {
            redirect_with_flash(&ctx, "/signup", &err.to_string()).await
        }
        Err(err) => {
            tracing::error!("Signup failed: {}", err);
            redirect_with_flash(&ctx, "/signup", messages::GENERIC_ERROR).await
        }
    }
}

pub async fn login_page(ctx: RequestContext) -> Result<LoginTemplate, AppError> {
    let message = ctx.take_flash().await?;
    let csrf_token = get_or_create_csrf_token(ctx.session()).await?;
    Ok(LoginTemplate {
        message,
        csrf_token,
    })
}

pub async fn login_handler(
    State(app_state): State<AppState>,
    mut ctx: RequestContext,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if validate_csrf_form_field(ctx.session(), &form.csrf_token)
        .await
        .is_err()
    {
        return redirect_with_flash(&ctx, "/login", messages::INVALID_CSRF).await;
    }

    let request = LoginRequest {
        email: form.email,
        password: form.password,
    };

    match app_state.auth_service.authenticate(request).await {
        Ok(user) => {
            let user = SessionUser::from(&user);
            ctx.sign_in(user.clone()).await?;

            let template = IndexTemplate {
                user: Some(user),
                message: ctx.take_flash().await?,
                csrf_token: get_or_create_csrf_token(ctx.session()).await?,
            };
            Ok(template.into_response())
        }
        Err(AuthServiceError::InvalidCredentials) => {
            redirect_with_flash(&ctx, "/login", messages::BAD_CREDENTIALS).await
        }
        Err(err) => {
            tracing::error!("Login failed: {}", err);
            redirect_with_flash(&ctx, "/login", messages::GENERIC_ERROR).await
        }
    }
}

pub async fn logout_handler(mut ctx: RequestContext) -> Result<Redirect, AppError> {
    ctx.sign_out().await?;
    Ok(Redirect::to("/"))
}

pub async fn logout_form_handler(
    mut ctx: RequestContext,
    Form(form): Form<LogoutForm>,
) -> Result<Response, AppError> {
    if validate_csrf_form_field(ctx.session(), &form.csrf_token)
        .await
        .is_err()
    {
        return redirect_with_flash(&ctx, "/", messages::INVALID_CSRF).await;
    }

    ctx.sign_out().await?;
    Ok(Redirect::to("/").into_response())
}
