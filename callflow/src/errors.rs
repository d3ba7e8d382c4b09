use crate::db::errors::DbError;
use crate::import::ImportError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided, or the session no longer maps to a usable account
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Login attempted with an email that matches no user
    #[error("No user found with email {email}")]
    UserNotFound { email: String },

    /// Login attempted against a disabled account
    #[error("Account is disabled")]
    AccountDisabled,

    /// Password did not match the stored hash
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Session is valid but the account must change its password before anything else
    #[error("Password reset required")]
    PasswordResetRequired,

    /// New password and its confirmation differ
    #[error("New passwords do not match")]
    Mismatch,

    /// Current password supplied during a voluntary password change was wrong
    #[error("Current password is incorrect")]
    WrongCurrentPassword,

    /// New password violates the configured length policy
    #[error("{message}")]
    PasswordPolicy { message: String },

    /// Admin tried to act on their own account through user administration
    #[error("Action not allowed: {message}")]
    ActionNotAllowed { message: String },

    /// Non-admin reached an admin-only surface
    #[error("Access denied to {resource}")]
    AccessDenied { resource: String },

    /// Spreadsheet import failure
    #[error(transparent)]
    Import(#[from] ImportError),

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found (or not visible to the caller)
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Upload exceeds the configured size limit
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } | Error::InvalidCredentials | Error::WrongCurrentPassword => StatusCode::UNAUTHORIZED,
            Error::UserNotFound { .. } | Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::AccountDisabled | Error::PasswordResetRequired | Error::ActionNotAllowed { .. } | Error::AccessDenied { .. } => {
                StatusCode::FORBIDDEN
            }
            Error::Mismatch | Error::PasswordPolicy { .. } | Error::Import(_) | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::UserNotFound { .. } => "No user found with that email address.".to_string(),
            Error::AccountDisabled => "Your account is disabled. Please contact an administrator.".to_string(),
            Error::InvalidCredentials => "Incorrect password. Please try again.".to_string(),
            Error::PasswordResetRequired => "You must change your password before continuing.".to_string(),
            Error::Mismatch => "New passwords do not match.".to_string(),
            Error::WrongCurrentPassword => "Current password is incorrect.".to_string(),
            Error::PasswordPolicy { message } => message.clone(),
            Error::ActionNotAllowed { message } => message.clone(),
            Error::AccessDenied { .. } => "You do not have permission to view this page.".to_string(),
            Error::Import(e) => e.to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::PayloadTooLarge { message } => message.clone(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, table, .. } => match (table.as_deref(), constraint.as_deref()) {
                    (Some("users"), Some(c)) if c.contains("email") => "An account with this email address already exists".to_string(),
                    _ => "Resource already exists".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. }
            | Error::UserNotFound { .. }
            | Error::AccountDisabled
            | Error::InvalidCredentials
            | Error::PasswordResetRequired
            | Error::AccessDenied { .. }
            | Error::ActionNotAllowed { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::Mismatch
            | Error::WrongCurrentPassword
            | Error::PasswordPolicy { .. }
            | Error::Import(_)
            | Error::BadRequest { .. }
            | Error::NotFound { .. }
            | Error::PayloadTooLarge { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();

        match &self {
            // Duplicate emails get a minimal structured body so the client can point at the field
            Error::Database(DbError::UniqueViolation {
                constraint,
                table,
                conflicting_value,
                ..
            }) => {
                use serde_json::json;

                let resource = match (table.as_deref(), constraint.as_deref()) {
                    (Some("users"), Some(c)) if c.contains("email") => "user",
                    _ => "unknown",
                };
                let body = json!({
                    "message": self.user_message(),
                    "resource": resource,
                    "value": conflicting_value,
                });

                (status, axum::response::Json(body)).into_response()
            }
            _ => (status, self.user_message()).into_response(),
        }
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_failures_map_to_distinct_statuses() {
        assert_eq!(
            Error::UserNotFound {
                email: "a@x.com".to_string()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(Error::AccountDisabled.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(Error::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_user_not_found_message_does_not_echo_email() {
        let err = Error::UserNotFound {
            email: "secret@x.com".to_string(),
        };
        assert!(!err.user_message().contains("secret@x.com"));
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = Error::Internal {
            operation: "connect to the database at postgres://user:pw@host".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "Internal server error");
    }

    #[test]
    fn test_import_errors_are_bad_requests() {
        let err = Error::from(ImportError::EmptyFile);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.user_message(), ImportError::EmptyFile.to_string());
    }

    #[test]
    fn test_duplicate_email_is_conflict() {
        let err = Error::Database(DbError::UniqueViolation {
            constraint: Some("users_email_unique".to_string()),
            table: Some("users".to_string()),
            message: "duplicate key".to_string(),
            conflicting_value: Some("a@x.com".to_string()),
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.user_message(), "An account with this email address already exists");
    }
}
