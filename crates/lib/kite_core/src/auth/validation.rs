//! Registration and login input validation.

use std::sync::LazyLock;

use regex::Regex;

use super::AuthError;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$",
    )
    .expect("EMAIL_REGEX is a valid pattern")
});

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 6;
const EMAIL_MAX_LEN: usize = 254;

/// Canonical form of an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Canonical form of a username for storage.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_string()
}

/// Validate an already-normalized email address.
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.is_empty() {
        return Err(AuthError::ValidationError("Email is required".into()));
    }
    if email.len() > EMAIL_MAX_LEN || !EMAIL_REGEX.is_match(email) {
        return Err(AuthError::ValidationError(
            "Email must be a valid email address".into(),
        ));
    }
    Ok(())
}

/// Validate a registration request. Inputs are expected to be normalized.
pub fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
) -> Result<(), AuthError> {
    let username_len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&username_len) {
        return Err(AuthError::ValidationError(format!(
            "Username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
        )));
    }
    validate_email(email)?;
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(AuthError::ValidationError(format!(
            "Password must be at least {PASSWORD_MIN_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate a login request: both fields present and the email well-formed.
pub fn validate_login(email: &str, password: &str) -> Result<(), AuthError> {
    validate_email(email)?;
    if password.is_empty() {
        return Err(AuthError::ValidationError("Password is required".into()));
    }
    Ok(())
}
