//! API request/response models for the authentication surface.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::users::UserResponse;
use crate::auth::gate::Destination;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "agent@example.com")]
    pub email: String,
    pub password: String,
}

/// Password change. `current_password` is ignored while a reset is pending.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: String,
    pub confirm_password: String,
}

/// Self-service profile edit from the account screen
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// The session user and where the client should go next
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub destination: Destination,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSuccessResponse {
    pub message: String,
}

/// An [`AuthResponse`] that also (re)issues the session cookie
#[derive(Debug)]
pub struct SessionResponse {
    pub auth_response: AuthResponse,
    pub cookie: String,
}

/// Clears the session cookie
#[derive(Debug)]
pub struct LogoutResponse {
    pub auth_response: AuthSuccessResponse,
    pub cookie: String,
}

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
            response
        }
        Err(e) => {
            tracing::error!("Session cookie is not a valid header value: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

impl IntoResponse for SessionResponse {
    fn into_response(self) -> Response {
        with_cookie(Json(self.auth_response).into_response(), &self.cookie)
    }
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        with_cookie(Json(self.auth_response).into_response(), &self.cookie)
    }
}
