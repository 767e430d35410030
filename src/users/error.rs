use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

/// One failed field check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Every field check that failed for a single write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: &'static str) {
        self.0.push(FieldError { field, message });
    }

    #[cfg(test)]
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn into_result(self) -> std::result::Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Error, Debug)]
pub enum UserError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Email already registered")]
    EmailTaken,

    #[error("User not found")]
    NotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<ValidationErrors> for UserError {
    fn from(e: ValidationErrors) -> Self {
        UserError::Validation(e)
    }
}

impl UserError {
    pub fn status(&self) -> StatusCode {
        match self {
            UserError::Validation(_) => StatusCode::BAD_REQUEST,
            UserError::EmailTaken => StatusCode::CONFLICT,
            UserError::NotFound => StatusCode::NOT_FOUND,
            UserError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            UserError::Hash(_) | UserError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, UserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_render_every_field() {
        let mut errs = ValidationErrors::default();
        errs.push("email", "must be a valid email address");
        errs.push("password", "must be at least 4 characters");
        let msg = UserError::from(errs).to_string();
        assert!(msg.contains("email: must be a valid email address"));
        assert!(msg.contains("password: must be at least 4 characters"));
    }

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(UserError::EmailTaken.status(), StatusCode::CONFLICT);
        assert_eq!(UserError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(UserError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            UserError::Hash("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            UserError::Validation(ValidationErrors::default()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn empty_errors_are_ok() {
        assert!(ValidationErrors::default().into_result().is_ok());
    }

    #[test]
    fn collected_errors_come_back_as_err() {
        let mut errs = ValidationErrors::default();
        errs.push("email", "must be a valid email address");
        let back = errs.clone().into_result().unwrap_err();
        assert_eq!(back, errs);
    }
}
