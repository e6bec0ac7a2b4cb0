use std::sync::LazyLock;

use regex::Regex;

use crate::constants::MIN_PASSWORD_LENGTH;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._-]+@[a-z]+\.+[a-z]+$").expect("email pattern is valid")
});

/// Outcome of a single field check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error_message: Option<String>,
}

impl ValidationResult {
    #[must_use]
    pub const fn valid() -> Self {
        Self {
            is_valid: true,
            error_message: None,
        }
    }

    fn invalid(message: &str) -> Self {
        Self {
            is_valid: false,
            error_message: Some(message.to_string()),
        }
    }
}

#[must_use]
pub fn validate_email(email: &str) -> ValidationResult {
    if email.trim().is_empty() {
        return ValidationResult::invalid("Email cannot be empty");
    }
    if !EMAIL_PATTERN.is_match(email) {
        return ValidationResult::invalid("Please enter a valid email");
    }
    ValidationResult::valid()
}

#[must_use]
pub fn validate_password(password: &str) -> ValidationResult {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return ValidationResult::invalid(&format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }
    let has_digit = password.chars().any(char::is_numeric);
    let has_letter = password.chars().any(char::is_alphabetic);
    if !(has_digit && has_letter) {
        return ValidationResult::invalid("Password must contain both letters and numbers");
    }
    ValidationResult::valid()
}

#[must_use]
pub fn validate_repeated_password(password: &str, repeated: &str) -> ValidationResult {
    if password != repeated {
        return ValidationResult::invalid("Passwords don't match");
    }
    ValidationResult::valid()
}
