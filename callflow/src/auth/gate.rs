//! Credential checks for login and password change.
//!
//! Login outcomes, in the order they are checked:
//!
//! 1. no user with that exact email: [`Error::UserNotFound`]
//! 2. the account is disabled: [`Error::AccountDisabled`], whatever the password
//! 3. the password does not match: [`Error::InvalidCredentials`]
//!
//! A successful login lands on the account screen while `password_reset_required` is set, and on
//! the dashboard otherwise. Until the reset is done, every other protected surface refuses the
//! session (see [`crate::auth::current_user::ActiveUser`]).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    api::models::users::{CurrentUser, UserStatus},
    auth::password,
    config::PasswordConfig,
    db::models::users::UserDBResponse,
    errors::{Error, Result},
};

/// Where the client should go after an auth state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Destination {
    #[serde(rename = "/dashboard/account")]
    Account,
    #[serde(rename = "/dashboard")]
    Dashboard,
}

impl Destination {
    pub fn for_user(user: &CurrentUser) -> Self {
        if user.password_reset_required {
            Destination::Account
        } else {
            Destination::Dashboard
        }
    }
}

/// Check a login attempt against the user looked up by `email`.
pub async fn authenticate(candidate: Option<UserDBResponse>, email: &str, password: &str) -> Result<UserDBResponse> {
    let user = candidate.ok_or_else(|| Error::UserNotFound { email: email.to_string() })?;

    if user.status == UserStatus::Disabled {
        return Err(Error::AccountDisabled);
    }

    let hash = user.password_hash.clone().ok_or(Error::InvalidCredentials)?;
    if !password::verify_blocking(password.to_string(), hash).await? {
        return Err(Error::InvalidCredentials);
    }

    Ok(user)
}

/// Length bounds for a new password, counted in characters
pub fn check_password_policy(policy: &PasswordConfig, new_password: &str) -> Result<()> {
    let length = new_password.chars().count();
    if length < policy.min_length {
        return Err(Error::PasswordPolicy {
            message: format!("Password must be at least {} characters.", policy.min_length),
        });
    }
    if length > policy.max_length {
        return Err(Error::PasswordPolicy {
            message: format!("Password must be no more than {} characters.", policy.max_length),
        });
    }
    Ok(())
}

/// Validate a password change for `user`.
///
/// The current password is only asked for outside a forced reset. Checks run policy first,
/// then confirmation, then the current password.
pub async fn check_password_change(
    policy: &PasswordConfig,
    user: &UserDBResponse,
    current_password: Option<&str>,
    new_password: &str,
    confirm_password: &str,
) -> Result<()> {
    check_password_policy(policy, new_password)?;

    if new_password != confirm_password {
        return Err(Error::Mismatch);
    }

    if user.password_reset_required {
        return Ok(());
    }

    let current = current_password.ok_or_else(|| Error::BadRequest {
        message: "Current password is required.".to_string(),
    })?;
    let hash = user.password_hash.clone().ok_or(Error::WrongCurrentPassword)?;
    if !password::verify_blocking(current.to_string(), hash).await? {
        return Err(Error::WrongCurrentPassword);
    }

    Ok(())
}
