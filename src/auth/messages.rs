//! User-facing flash texts.

pub const EMAIL_TAKEN: &str = "Email already exists";
pub const GENERIC_ERROR: &str = "An error occurred";
pub const BAD_CREDENTIALS: &str = "Email or password is incorrect";
pub const RESET_EMAIL_SENT: &str = "Password reset email sent";
pub const NO_SUCH_EMAIL: &str = "No user with that email address found";
pub const PASSWORDS_DIFFER: &str = "Passwords do not match";
pub const RESET_SUCCEEDED: &str = "Your password has been reset successfully";
pub const RESET_FAILED: &str = "An error occurred while resetting your password";
pub const INVALID_CSRF: &str = "Invalid security token. Please refresh the page and try again.";
