pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use axum::{
    middleware::from_fn,
    routing::get,
    Router,
};
use config::{AppConfig, SessionLayer};
use repositories::SqliteUserRepository;
use services::{AuthService, EmailService, PasswordResetService, UserService};
use std::sync::Arc;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AuthService>,
    pub password_reset_service: Arc<PasswordResetService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wires the SQLite-backed services around `pool`.
    pub fn new(
        pool: sqlx::SqlitePool,
        config: AppConfig,
        email_service: Box<dyn EmailService>,
    ) -> Self {
        let user_repository = Arc::new(SqliteUserRepository::new(pool));

        Self {
            user_service: Arc::new(UserService::new(user_repository.clone())),
            auth_service: Arc::new(AuthService::new(user_repository.clone())),
            password_reset_service: Arc::new(PasswordResetService::new(
                user_repository,
                email_service,
                config.reset_token_ttl,
            )),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState, session_layer: SessionLayer) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route("/", get(handlers::index_handler))
        .route(
            "/login",
            get(auth::handlers::login_page).post(auth::handlers::login_handler),
        )
        .route(
            "/signup",
            get(auth::handlers::signup_page).post(auth::handlers::signup_handler),
        )
        .route(
            "/logout",
            get(auth::handlers::logout_handler).post(auth::handlers::logout_form_handler),
        )
        .route(
            "/forgot-password",
            get(auth::password_reset::forgot_password_page)
                .post(auth::password_reset::forgot_password_handler),
        )
        .route(
            "/reset-password",
            get(auth::password_reset::reset_password_page)
                .post(auth::password_reset::reset_password_handler),
        )
        // Informational pages
        .route_service("/home", ServeFile::new(static_dir.join("home.html")))
        .route_service("/about", ServeFile::new(static_dir.join("about.html")))
        .route_service("/contact", ServeFile::new(static_dir.join("contact.html")))
        .nest_service("/static", ServeDir::new(&static_dir))
        // Layers
        .layer(session_layer)
        .layer(from_fn(middleware::add_security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
