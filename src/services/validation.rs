/// Form checks that run before anything touches the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Name is required")]
    MissingName,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password is required")]
    MissingPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::MissingName);
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() || !email.contains('@') || email.len() > 255 {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

/// A password must be present and, when a confirmation was supplied, equal to it.
pub fn validate_password(password: &str, confirm: Option<&str>) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingPassword);
    }
    if let Some(confirm) = confirm {
        if password != confirm {
            return Err(ValidationError::PasswordMismatch);
        }
    }
    Ok(())
}
