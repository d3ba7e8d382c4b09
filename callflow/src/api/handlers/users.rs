//! Admin-only user administration.
//!
//! Every handler here takes [`AdminUser`], so non-admins are refused before anything is read.
//! Self-action guards run before any write.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role, TemporaryPasswordResponse, UserCreate, UserResponse, UserStatus, UserUpdate},
    auth::{
        current_user::AdminUser,
        password::{self, Argon2Params},
    },
    changes::{ChangeEvent, ChangeKind},
    db::{
        errors::DbError,
        handlers::{Repository, Users, users::UserFilter},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{Collection, UserId},
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    #[param(value_type = Option<String>)]
    pub role: Option<Role>,
    #[param(value_type = Option<String>)]
    pub status: Option<UserStatus>,
}

fn not_found(id: UserId) -> Error {
    Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    }
}

/// Reject an admin acting on their own account through this surface
fn forbid_self(admin: &CurrentUser, target: UserId, message: &str) -> Result<()> {
    if admin.id == target {
        return Err(Error::ActionNotAllowed {
            message: message.to_string(),
        });
    }
    Ok(())
}

fn require_name_and_email(name: Option<&str>, email: Option<&str>) -> Result<()> {
    if name.is_some_and(|n| n.trim().is_empty()) || email.is_some_and(|e| e.trim().is_empty()) {
        return Err(Error::BadRequest {
            message: "Name and email cannot be empty.".to_string(),
        });
    }
    Ok(())
}

async fn temporary_password_hash(state: &AppState) -> Result<(String, String)> {
    let policy = &state.config.auth.password;
    let temporary_password = password::generate_temporary_password(policy.temporary_length);
    let hash = password::hash_blocking(temporary_password.clone(), Argon2Params::from(policy)).await?;
    Ok((temporary_password, hash))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    summary = "List users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "All users, oldest first", body = Vec<UserResponse>),
        (status = 403, description = "Not an admin"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    _: AdminUser,
) -> Result<Json<Vec<UserResponse>>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let users = Users::new(&mut conn)
        .list(&UserFilter {
            role: query.role,
            status: query.status,
        })
        .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    summary = "Create a user with a temporary password",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created; the temporary password is only shown here", body = TemporaryPasswordResponse),
        (status = 403, description = "Not an admin"),
        (status = 409, description = "Email already in use"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    _: AdminUser,
    Json(request): Json<UserCreate>,
) -> Result<(StatusCode, Json<TemporaryPasswordResponse>)> {
    require_name_and_email(Some(&request.name), Some(&request.email))?;

    let (temporary_password, hash) = temporary_password_hash(&state).await?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest::with_temporary_password(request, hash))
        .await?;

    state
        .changes
        .publish(ChangeEvent::new(Collection::Users, ChangeKind::Created, user.id));

    Ok((
        StatusCode::CREATED,
        Json(TemporaryPasswordResponse {
            user: UserResponse::from(user),
            temporary_password,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "users",
    summary = "Get a user",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "The user", body = UserResponse),
        (status = 404, description = "No such user"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<UserId>, _: AdminUser) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let user = Users::new(&mut conn).get_by_id(id).await?.ok_or_else(|| not_found(id))?;

    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    tag = "users",
    summary = "Edit a user",
    request_body = UserUpdate,
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 403, description = "Disabling your own account, or removing the last admin"),
        (status = 404, description = "No such user"),
        (status = 409, description = "Email already in use"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    AdminUser(admin): AdminUser,
    Json(request): Json<UserUpdate>,
) -> Result<Json<UserResponse>> {
    if request.status == Some(UserStatus::Disabled) {
        forbid_self(&admin, id, "You cannot disable your own account.")?;
    }
    require_name_and_email(request.name.as_deref(), request.email.as_deref())?;

    let mut tx = state.db.begin().await.map_err(DbError::from)?;
    let mut users = Users::new(&mut tx);
    let existing = users.get_by_id(id).await?.ok_or_else(|| not_found(id))?;

    if existing.role == Role::Admin && request.role == Some(Role::User) && users.count_admins().await? <= 1 {
        return Err(Error::ActionNotAllowed {
            message: "At least one admin must remain.".to_string(),
        });
    }

    let user = users.update(id, &UserUpdateDBRequest::new(request)).await?;
    tx.commit().await.map_err(DbError::from)?;

    state
        .changes
        .publish(ChangeEvent::new(Collection::Users, ChangeKind::Updated, user.id));

    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/reset-password",
    tag = "users",
    summary = "Issue a new temporary password",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "New temporary password, shown once", body = TemporaryPasswordResponse),
        (status = 403, description = "Resetting your own password"),
        (status = 404, description = "No such user"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    AdminUser(admin): AdminUser,
) -> Result<Json<TemporaryPasswordResponse>> {
    forbid_self(&admin, id, "You cannot reset your own password here. Use the account page instead.")?;

    let (temporary_password, hash) = temporary_password_hash(&state).await?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let user = Users::new(&mut conn)
        .update(id, &UserUpdateDBRequest::password(hash, true))
        .await
        .map_err(|e| match e {
            DbError::NotFound => not_found(id),
            other => other.into(),
        })?;

    state
        .changes
        .publish(ChangeEvent::new(Collection::Users, ChangeKind::Updated, user.id));

    Ok(Json(TemporaryPasswordResponse {
        user: UserResponse::from(user),
        temporary_password,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/toggle-status",
    tag = "users",
    summary = "Enable a disabled user or disable an active one",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 403, description = "Toggling your own account"),
        (status = 404, description = "No such user"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn toggle_status(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    AdminUser(admin): AdminUser,
) -> Result<Json<UserResponse>> {
    forbid_self(&admin, id, "You cannot disable your own account.")?;

    let mut tx = state.db.begin().await.map_err(DbError::from)?;
    let mut users = Users::new(&mut tx);
    let existing = users.get_by_id(id).await?.ok_or_else(|| not_found(id))?;
    let user = users
        .update(
            id,
            &UserUpdateDBRequest {
                status: Some(existing.status.toggled()),
                ..Default::default()
            },
        )
        .await?;
    tx.commit().await.map_err(DbError::from)?;

    tracing::info!(user_id = %user.id, status = ?user.status, "User status toggled");
    state
        .changes
        .publish(ChangeEvent::new(Collection::Users, ChangeKind::Updated, user.id));

    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    tag = "users",
    summary = "Delete a user",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Deleting your own account"),
        (status = 404, description = "No such user"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(State(state): State<AppState>, Path(id): Path<UserId>, AdminUser(admin): AdminUser) -> Result<StatusCode> {
    forbid_self(&admin, id, "You cannot delete your own user account.")?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    if !Users::new(&mut conn).delete(id).await? {
        return Err(not_found(id));
    }

    state
        .changes
        .publish(ChangeEvent::new(Collection::Users, ChangeKind::Deleted, id));

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::models::users::UserDBResponse,
        test_utils::{create_test_app, create_test_user, session_header},
    };
    use axum_test::TestServer;
    use sqlx::PgPool;

    async fn stored(pool: &PgPool, id: UserId) -> Option<UserDBResponse> {
        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn).get_by_id(id).await.unwrap()
    }

    async fn as_admin(pool: &PgPool) -> (TestServer, AppState, UserDBResponse, (String, String)) {
        let (server, state) = create_test_app(pool.clone());
        let admin = create_test_user(pool, Role::Admin).await;
        let header = session_header(&state, &admin);
        (server, state, admin, header)
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_non_admin_is_denied_everything(pool: PgPool) {
        let (server, state) = create_test_app(pool.clone());
        let user = create_test_user(&pool, Role::User).await;
        let other = create_test_user(&pool, Role::User).await;
        let (name, value) = session_header(&state, &user);

        server
            .get("/api/v1/users")
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .delete(&format!("/api/v1/users/{}", other.id))
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        assert!(stored(&pool, other.id).await.is_some());

        server.get("/api/v1/users").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_user_returns_temporary_password_once(pool: PgPool) {
        let (server, state, _admin, (name, value)) = as_admin(&pool).await;

        let response = server
            .post("/api/v1/users")
            .add_header(&name, &value)
            .json(&UserCreate {
                name: "New Agent".to_string(),
                email: "new.agent@example.com".to_string(),
                role: Role::User,
                status: None,
            })
            .await;
        response.assert_status(StatusCode::CREATED);

        let body: TemporaryPasswordResponse = response.json();
        assert_eq!(body.temporary_password.len(), state.config.auth.password.temporary_length);
        assert!(body.temporary_password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(body.user.status, UserStatus::Active);
        assert!(body.user.password_reset_required);

        // The temporary password works for login
        let response = server
            .post("/authentication/login")
            .json(&serde_json::json!({"email": "new.agent@example.com", "password": &body.temporary_password}))
            .await;
        response.assert_status_ok();

        // Not echoed by reads
        let listed = server.get("/api/v1/users").add_header(&name, &value).await;
        assert!(!listed.text().contains(&body.temporary_password));

        let duplicate = server
            .post("/api/v1/users")
            .add_header(&name, &value)
            .json(&UserCreate {
                name: "Dup".to_string(),
                email: "new.agent@example.com".to_string(),
                role: Role::User,
                status: Some(UserStatus::Disabled),
            })
            .await;
        duplicate.assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_self_actions_are_rejected_without_writes(pool: PgPool) {
        let (server, _state, admin, (name, value)) = as_admin(&pool).await;

        let response = server
            .delete(&format!("/api/v1/users/{}", admin.id))
            .add_header(&name, &value)
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(response.text(), "You cannot delete your own user account.");

        server
            .post(&format!("/api/v1/users/{}/toggle-status", admin.id))
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .post(&format!("/api/v1/users/{}/reset-password", admin.id))
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .patch(&format!("/api/v1/users/{}", admin.id))
            .add_header(&name, &value)
            .json(&UserUpdate {
                status: Some(UserStatus::Disabled),
                ..Default::default()
            })
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let after = stored(&pool, admin.id).await.unwrap();
        assert_eq!(after.status, UserStatus::Active);
        assert!(!after.password_reset_required);
        assert_eq!(after.password_hash, admin.password_hash);
        assert_eq!(after.updated_at, admin.updated_at);

        // Editing your own name is fine
        server
            .patch(&format!("/api/v1/users/{}", admin.id))
            .add_header(&name, &value)
            .json(&UserUpdate {
                name: Some("Head Admin".to_string()),
                ..Default::default()
            })
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_toggle_reset_and_delete_other_user(pool: PgPool) {
        let (server, state, _admin, (name, value)) = as_admin(&pool).await;
        let target = create_test_user(&pool, Role::User).await;
        let target_header = session_header(&state, &target);
        let mut events = state.changes.subscribe();

        let response = server
            .post(&format!("/api/v1/users/{}/toggle-status", target.id))
            .add_header(&name, &value)
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<UserResponse>().status, UserStatus::Disabled);
        assert_eq!(events.next().await.map(|e| e.kind), Some(ChangeKind::Updated));

        // The disabled user's existing session stops working
        server
            .get("/api/v1/groups")
            .add_header(&target_header.0, &target_header.1)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .post(&format!("/api/v1/users/{}/toggle-status", target.id))
            .add_header(&name, &value)
            .await;
        assert_eq!(response.json::<UserResponse>().status, UserStatus::Active);

        let response = server
            .post(&format!("/api/v1/users/{}/reset-password", target.id))
            .add_header(&name, &value)
            .await;
        response.assert_status_ok();
        let body: TemporaryPasswordResponse = response.json();
        assert!(body.user.password_reset_required);
        assert_ne!(stored(&pool, target.id).await.unwrap().password_hash, target.password_hash);

        server
            .delete(&format!("/api/v1/users/{}", target.id))
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        assert!(stored(&pool, target.id).await.is_none());

        server
            .delete(&format!("/api/v1/users/{}", target.id))
            .add_header(&name, &value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_last_admin_cannot_be_demoted(pool: PgPool) {
        let (server, _state, admin, (name, value)) = as_admin(&pool).await;

        server
            .patch(&format!("/api/v1/users/{}", admin.id))
            .add_header(&name, &value)
            .json(&UserUpdate {
                role: Some(Role::User),
                ..Default::default()
            })
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let second = create_test_user(&pool, Role::Admin).await;
        let response = server
            .patch(&format!("/api/v1/users/{}", second.id))
            .add_header(&name, &value)
            .json(&UserUpdate {
                role: Some(Role::User),
                ..Default::default()
            })
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<UserResponse>().role, Role::User);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters(pool: PgPool) {
        let (server, _state, admin, (name, value)) = as_admin(&pool).await;
        let user = create_test_user(&pool, Role::User).await;

        let all: Vec<UserResponse> = server.get("/api/v1/users").add_header(&name, &value).await.json();
        assert_eq!(all.iter().map(|u| u.id).collect::<Vec<_>>(), vec![admin.id, user.id]);

        let admins: Vec<UserResponse> = server
            .get("/api/v1/users?role=Admin")
            .add_header(&name, &value)
            .await
            .json();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].id, admin.id);
    }
}
