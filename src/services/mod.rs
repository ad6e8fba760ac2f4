pub mod auth_service;
pub mod email_service;
pub mod password;
pub mod password_reset_service;
pub mod user_service;
pub mod validation;

pub use auth_service::AuthService;
pub use email_service::{create_email_service, EmailService};
pub use password_reset_service::PasswordResetService;
pub use user_service::UserService;
