use lazy_static::lazy_static;
use regex::Regex;

use super::dto::SignupRequest;
use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Basic `local@domain.tld` shape check.
pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// A signup request that passed validation.
#[derive(Debug, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Checks run in order: presence, password length, email shape.
/// The email is trimmed but keeps its case.
pub fn validate_signup(req: SignupRequest) -> Result<NewAccount, AppError> {
    let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (Some(name), Some(email), Some(password)) =
        (present(req.name), present(req.email), present(req.password))
    else {
        return Err(AppError::Validation("Missing required fields".into()));
    };

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(
            "Password must be at least 6 characters long".into(),
        ));
    }

    let email = email.trim().to_string();
    if !is_valid_email(&email) {
        return Err(AppError::Validation(
            "Please enter a valid email address".into(),
        ));
    }

    Ok(NewAccount {
        name: name.trim().to_string(),
        email,
        password,
    })
}
