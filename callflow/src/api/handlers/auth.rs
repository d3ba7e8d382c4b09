use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{
        auth::{AuthResponse, AuthSuccessResponse, ChangePasswordRequest, LoginRequest, LogoutResponse, ProfileUpdate, SessionResponse},
        users::{CurrentUser, UserResponse},
    },
    auth::{
        gate::{self, Destination},
        password::{self, Argon2Params},
        session,
    },
    changes::{ChangeEvent, ChangeKind},
    db::{
        errors::DbError,
        handlers::{Repository, Users},
        models::users::{UserDBResponse, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::Collection,
};

/// Sign `user` in (again) and describe where they land
fn issue_session(state: &AppState, user: UserDBResponse, message: &str) -> Result<SessionResponse> {
    let current_user = CurrentUser::from(user.clone());
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = session::create_session_cookie(&token, &state.config);

    Ok(SessionResponse {
        auth_response: AuthResponse {
            user: UserResponse::from(user),
            destination: Destination::for_user(&current_user),
            message: message.to_string(),
        },
        cookie,
    })
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Incorrect password"),
        (status = 403, description = "Account disabled"),
        (status = 404, description = "No user with that email"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<SessionResponse> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let candidate = Users::new(&mut conn).get_user_by_email(&request.email).await?;

    let user = gate::authenticate(candidate, &request.email, &request.password).await?;
    tracing::debug!(user_id = %user.id, reset_required = user.password_reset_required, "Login successful");

    issue_session(&state, user, "Login successful")
}

/// Logout (clear session)
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> LogoutResponse {
    LogoutResponse {
        auth_response: AuthSuccessResponse {
            message: "Logout successful".to_string(),
        },
        cookie: session::clear_session_cookie(&state.config),
    }
}

/// The session user and their destination. Allowed while a password reset is pending.
#[utoipa::path(
    get,
    path = "/authentication/me",
    tag = "authentication",
    responses(
        (status = 200, description = "Current session", body = AuthResponse),
        (status = 401, description = "Not signed in"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<AuthResponse>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let user = Users::new(&mut conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;

    Ok(Json(AuthResponse {
        destination: Destination::for_user(&current_user),
        user: UserResponse::from(user),
        message: "Authenticated".to_string(),
    }))
}

/// Update the session user's own name or email
#[utoipa::path(
    patch,
    path = "/authentication/profile",
    request_body = ProfileUpdate,
    tag = "authentication",
    responses(
        (status = 200, description = "Profile updated", body = AuthResponse),
        (status = 400, description = "Empty name or email"),
        (status = 401, description = "Not signed in"),
        (status = 409, description = "Email already in use"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ProfileUpdate>,
) -> Result<SessionResponse> {
    let name = request.name.map(|n| n.trim().to_string());
    let email = request.email.map(|e| e.trim().to_string());
    if name.as_deref() == Some("") || email.as_deref() == Some("") {
        return Err(Error::BadRequest {
            message: "Name and email cannot be empty.".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let updated = Users::new(&mut conn)
        .update(
            current_user.id,
            &UserUpdateDBRequest {
                name,
                email,
                ..Default::default()
            },
        )
        .await?;

    state
        .changes
        .publish(ChangeEvent::new(Collection::Users, ChangeKind::Updated, updated.id));

    issue_session(&state, updated, "Profile updated")
}

/// Change the session user's password, completing a forced reset if one is pending
#[utoipa::path(
    post,
    path = "/authentication/password-change",
    request_body = ChangePasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password changed", body = AuthResponse),
        (status = 400, description = "Too short, too long, or confirmation mismatch"),
        (status = 401, description = "Current password is incorrect"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<SessionResponse> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut users = Users::new(&mut conn);
    let user = users
        .get_by_id(current_user.id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;

    let policy = &state.config.auth.password;
    gate::check_password_change(
        policy,
        &user,
        request.current_password.as_deref(),
        &request.new_password,
        &request.confirm_password,
    )
    .await?;

    let password_hash = password::hash_blocking(request.new_password, Argon2Params::from(policy)).await?;
    let updated = users.update(user.id, &UserUpdateDBRequest::password(password_hash, false)).await?;

    state
        .changes
        .publish(ChangeEvent::new(Collection::Users, ChangeKind::Updated, updated.id));

    issue_session(&state, updated, "Password changed successfully")
}
