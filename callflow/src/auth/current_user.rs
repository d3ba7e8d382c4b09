//! Request extractors for the session user.
//!
//! [`CurrentUser`] accepts any signed-in user whose account still exists and is active, which is
//! all the account screen needs. [`ActiveUser`] additionally refuses sessions that still owe a
//! password reset, and [`AdminUser`] narrows that to admins.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    api::models::users::{CurrentUser, UserStatus},
    auth::session,
    config::Config,
    db::handlers::{Repository, Users},
    errors::{Error, Result},
};

/// Find the session cookie and decode it.
/// Returns:
/// - None: no session cookie present
/// - Some(Ok(user)): token verified
/// - Some(Err(error)): cookie present but unusable
fn session_from_cookie(parts: &Parts, config: &Config) -> Option<Result<CurrentUser>> {
    let cookie_header = parts.headers.get(header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }));
        }
    };
    let cookie_name = &config.auth.session.cookie_name;

    let mut last_error = None;
    for cookie in cookie_str.split(';') {
        if let Some((name, value)) = cookie.trim().split_once('=') {
            if name != cookie_name {
                continue;
            }
            match session::verify_session_token(value, config) {
                Ok(user) => return Some(Ok(user)),
                Err(e) => last_error = Some(e),
            }
        }
    }
    last_error.map(Err)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip_all)]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let claimed = match session_from_cookie(parts, &state.config) {
            Some(Ok(user)) => user,
            Some(Err(e)) => {
                trace!("Session cookie rejected: {:?}", e);
                return Err(Error::Unauthenticated { message: None });
            }
            None => {
                trace!("No session cookie on request");
                return Err(Error::Unauthenticated { message: None });
            }
        };

        // The token only says who signed in; the stored record decides what they are now
        let mut conn = state.db.acquire().await.map_err(crate::db::errors::DbError::from)?;
        let stored = Users::new(&mut conn).get_by_id(claimed.id).await?;

        match stored {
            Some(user) if user.status == UserStatus::Active => {
                debug!("Authenticated session for user {}", user.id);
                Ok(CurrentUser::from(user))
            }
            Some(user) => {
                debug!("Session for disabled user {} refused", user.id);
                Err(Error::Unauthenticated {
                    message: Some("Your account has been disabled.".to_string()),
                })
            }
            None => {
                debug!("Session for deleted user {} refused", claimed.id);
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}

/// A signed-in user who has no pending password reset
#[derive(Debug, Clone)]
pub struct ActiveUser(pub CurrentUser);

impl FromRequestParts<AppState> for ActiveUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        require_no_pending_reset(user).map(ActiveUser)
    }
}

/// A signed-in admin with no pending password reset
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let ActiveUser(user) = ActiveUser::from_request_parts(parts, state).await?;
        require_admin(user).map(AdminUser)
    }
}

pub fn require_no_pending_reset(user: CurrentUser) -> Result<CurrentUser> {
    if user.password_reset_required {
        return Err(Error::PasswordResetRequired);
    }
    Ok(user)
}

pub fn require_admin(user: CurrentUser) -> Result<CurrentUser> {
    if !user.is_admin() {
        return Err(Error::AccessDenied {
            resource: "user administration".to_string(),
        });
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::users::Role,
        db::models::users::UserUpdateDBRequest,
        test_utils::{create_test_app_state, create_test_user},
    };
    use axum::http::StatusCode;
    use sqlx::PgPool;
    use uuid::Uuid;

    fn parts_with_cookie(cookie: &str) -> Parts {
        let request = axum::http::Request::builder()
            .uri("http://localhost/test")
            .header(header::COOKIE, cookie)
            .body(())
            .unwrap();
        request.into_parts().0
    }

    fn cookie_for(state: &AppState, user: CurrentUser) -> String {
        let token = session::create_session_token(&user, &state.config).unwrap();
        format!("theme=dark; {}={}", state.config.auth.session.cookie_name, token)
    }

    #[sqlx::test]
    async fn test_valid_session_extracts_stored_user(pool: PgPool) {
        let state = create_test_app_state(pool.clone());
        let user = create_test_user(&pool, Role::User).await;

        let mut parts = parts_with_cookie(&cookie_for(&state, CurrentUser::from(user.clone())));
        let current = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();

        assert_eq!(current.id, user.id);
        assert_eq!(current.email, user.email);
    }

    #[sqlx::test]
    async fn test_role_change_applies_to_existing_session(pool: PgPool) {
        let state = create_test_app_state(pool.clone());
        let user = create_test_user(&pool, Role::User).await;
        let cookie = cookie_for(&state, CurrentUser::from(user.clone()));

        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn)
            .update(
                user.id,
                &UserUpdateDBRequest {
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut parts = parts_with_cookie(&cookie);
        let AdminUser(admin) = AdminUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[sqlx::test]
    async fn test_disabled_or_deleted_user_is_signed_out(pool: PgPool) {
        let state = create_test_app_state(pool.clone());
        let disabled = create_test_user(&pool, Role::User).await;
        let cookie = cookie_for(&state, CurrentUser::from(disabled.clone()));

        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn)
            .update(
                disabled.id,
                &UserUpdateDBRequest {
                    status: Some(UserStatus::Disabled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut parts = parts_with_cookie(&cookie);
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let ghost = CurrentUser::from(create_test_user(&pool, Role::User).await);
        let ghost = CurrentUser { id: Uuid::new_v4(), ..ghost };
        let mut parts = parts_with_cookie(&cookie_for(&state, ghost));
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn test_missing_or_garbage_cookie_is_unauthenticated(pool: PgPool) {
        let state = create_test_app_state(pool);

        let request = axum::http::Request::builder().uri("http://localhost/test").body(()).unwrap();
        let mut parts = request.into_parts().0;
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));

        let mut parts = parts_with_cookie(&format!("{}=not-a-jwt", state.config.auth.session.cookie_name));
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[sqlx::test]
    async fn test_pending_reset_blocks_active_user(pool: PgPool) {
        let state = create_test_app_state(pool.clone());
        let user = create_test_user(&pool, Role::Admin).await;

        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn)
            .update(
                user.id,
                &UserUpdateDBRequest {
                    password_reset_required: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let cookie = cookie_for(&state, CurrentUser::from(user));

        let mut parts = parts_with_cookie(&cookie);
        assert!(CurrentUser::from_request_parts(&mut parts, &state).await.is_ok());

        let mut parts = parts_with_cookie(&cookie);
        let err = ActiveUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, Error::PasswordResetRequired));

        let mut parts = parts_with_cookie(&cookie);
        let err = AdminUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, Error::PasswordResetRequired));
    }

    #[test]
    fn test_require_admin() {
        let admin = CurrentUser {
            id: Uuid::new_v4(),
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            role: Role::Admin,
            status: UserStatus::Active,
            password_reset_required: false,
        };
        assert!(require_admin(admin.clone()).is_ok());

        let user = CurrentUser { role: Role::User, ..admin };
        let err = require_admin(user).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }
}
