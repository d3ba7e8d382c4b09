//! OpenAPI documentation for the authentication surface (`/authentication/*`) and the
//! application API (`/api/v1/*`). Served as JSON at `/openapi.json` and rendered at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::{api, changes, types};

/// Cookie session security scheme.
struct SessionSecurityAddon;

impl Modify for SessionSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "callflow_session",
                    "Session cookie set by `POST /authentication/login`. The cookie name is configurable.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SessionSecurityAddon),
    security(("CookieAuth" = [])),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::me,
        api::handlers::auth::update_profile,
        api::handlers::auth::change_password,
        api::handlers::users::list_users,
        api::handlers::users::create_user,
        api::handlers::users::get_user,
        api::handlers::users::update_user,
        api::handlers::users::reset_password,
        api::handlers::users::toggle_status,
        api::handlers::users::delete_user,
        api::handlers::groups::list_groups,
        api::handlers::groups::create_group,
        api::handlers::groups::update_group,
        api::handlers::groups::delete_group,
        api::handlers::students::list_students,
        api::handlers::students::create_student,
        api::handlers::students::update_student,
        api::handlers::students::delete_student,
        api::handlers::students::record_call,
        api::handlers::students::import_students,
        api::handlers::dashboard::get_dashboard,
        api::handlers::events::stream_changes,
    ),
    components(
        schemas(
            api::models::auth::LoginRequest,
            api::models::auth::ChangePasswordRequest,
            api::models::auth::ProfileUpdate,
            api::models::auth::AuthResponse,
            api::models::auth::AuthSuccessResponse,
            api::models::users::Role,
            api::models::users::UserStatus,
            api::models::users::UserCreate,
            api::models::users::UserUpdate,
            api::models::users::UserResponse,
            api::models::users::TemporaryPasswordResponse,
            api::models::groups::GroupCreate,
            api::models::groups::GroupUpdate,
            api::models::groups::GroupResponse,
            api::models::groups::GroupDeleteResponse,
            api::models::students::CallStatus,
            api::models::students::StudentStatus,
            api::models::students::StudentCreate,
            api::models::students::StudentUpdate,
            api::models::students::CallRecordCreate,
            api::models::students::CallRecordResponse,
            api::models::students::StudentResponse,
            api::models::students::ImportResponse,
            api::models::dashboard::StatusFilter,
            api::models::dashboard::StatusCounts,
            api::models::dashboard::DashboardResponse,
            changes::ChangeEvent,
            changes::ChangeKind,
            types::Collection,
        )
    ),
    tags(
        (name = "authentication", description = "Sign in and out, the current session, profile edits and password changes.

Accounts flagged for a password reset may only use this surface until they set a new password."),
        (name = "users", description = "User administration. Admin only; admins cannot disable, delete or reset themselves here."),
        (name = "groups", description = "Named collections of students. Users see and manage the groups they created; admins see all."),
        (name = "students", description = "Leads to call, their call history, and bulk import from `.xlsx` or `.csv` files."),
        (name = "dashboard", description = "Everything the main screen shows in one request."),
        (name = "events", description = "Server-sent change notifications so open clients can refresh."),
    ),
    info(
        title = "CallFlow API",
        version = "1.0.0",
        description = "Lead call tracking for small sales and admissions teams.

## Authentication

Sign in with `POST /authentication/login`. The response sets an HTTP-only session cookie that every other request must carry.

## Errors

Errors are returned as plain text with an appropriate status code. Duplicate email addresses return `409` with a JSON body naming the conflicting value.",
    ),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/authentication/login",
            "/authentication/password-change",
            "/api/v1/users/{id}/reset-password",
            "/api/v1/groups/{id}/students/import",
            "/api/v1/students/{id}/calls",
            "/api/v1/dashboard",
            "/api/v1/events",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let schemes = doc.components.expect("components").security_schemes;
        assert!(schemes.contains_key("CookieAuth"));
    }
}
