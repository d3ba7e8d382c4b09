//! Database models for users.

use crate::api::models::users::{Role, UserCreate, UserStatus, UserUpdate};
use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub password_hash: Option<String>,
    pub password_reset_required: bool,
}

impl UserCreateDBRequest {
    /// An admin-created user: must replace the generated password on first login
    pub fn with_temporary_password(api: UserCreate, password_hash: String) -> Self {
        Self {
            name: api.name,
            email: api.email,
            role: api.role,
            status: api.status.unwrap_or_default(),
            password_hash: Some(password_hash),
            password_reset_required: true,
        }
    }
}

/// Database request for updating a user. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub password_hash: Option<String>,
    pub password_reset_required: Option<bool>,
}

impl UserUpdateDBRequest {
    pub fn new(update: UserUpdate) -> Self {
        Self {
            name: update.name,
            email: update.email,
            role: update.role,
            status: update.status,
            ..Default::default()
        }
    }

    /// A new password hash, clearing or setting the reset flag
    pub fn password(password_hash: String, reset_required: bool) -> Self {
        Self {
            password_hash: Some(password_hash),
            password_reset_required: Some(reset_required),
            ..Default::default()
        }
    }
}

/// Database response for a user
#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub password_hash: Option<String>,
    pub password_reset_required: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
