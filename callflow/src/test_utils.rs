//! Shared fixtures for database and HTTP tests.

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role, UserStatus},
    auth::{password, session},
    changes::ChangeFeed,
    config::{Config, PoolSettings},
    db::{
        handlers::{Groups, Repository, Users},
        models::{
            groups::{GroupCreateDBRequest, GroupDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    types::UserId,
};
use axum_test::TestServer;
use rust_xlsxwriter::Workbook;
use sqlx::PgPool;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "correct-horse";

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_email: "admin@test.com".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        ..Default::default()
    };
    config.database.pool = PoolSettings {
        max_connections: 2,
        min_connections: 0,
        ..Default::default()
    };
    config.auth.session.cookie_secure = false;
    // Cheap hashes keep the suite fast
    config.auth.password.argon2_memory_kib = 1024;
    config.auth.password.argon2_iterations = 1;
    config.auth.password.argon2_parallelism = 1;
    config
}

pub fn create_test_app_state(pool: PgPool) -> AppState {
    AppState::builder()
        .db(pool)
        .config(create_test_config())
        .changes(ChangeFeed::default())
        .build()
}

/// The full router over a fresh state, plus the state for direct inspection
pub fn create_test_app(pool: PgPool) -> (TestServer, AppState) {
    let state = create_test_app_state(pool);
    let router = crate::build_router(state.clone()).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to create test server");
    (server, state)
}

/// An active user with [`TEST_PASSWORD`] and no pending reset
pub async fn create_test_user(pool: &PgPool, role: Role) -> UserDBResponse {
    create_test_user_with(pool, role, UserStatus::Active, false).await
}

pub async fn create_test_user_with(pool: &PgPool, role: Role, status: UserStatus, password_reset_required: bool) -> UserDBResponse {
    let config = create_test_config();
    let params = password::Argon2Params::from(&config.auth.password);
    let password_hash = password::hash_string_with_params(TEST_PASSWORD, Some(params)).expect("Failed to hash test password");

    let id = Uuid::new_v4();
    let request = UserCreateDBRequest {
        name: format!("Test User {}", id.simple()),
        email: format!("testuser_{}@example.com", id.simple()),
        role,
        status,
        password_hash: Some(password_hash),
        password_reset_required,
    };

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn).create(&request).await.expect("Failed to create test user")
}

pub async fn create_test_group(pool: &PgPool, owner: UserId, name: &str) -> GroupDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Groups::new(&mut conn)
        .create(&GroupCreateDBRequest {
            name: name.to_string(),
            created_by: owner,
        })
        .await
        .expect("Failed to create test group")
}

/// A `Cookie` header carrying a valid session for `user`
pub fn session_header(state: &AppState, user: &UserDBResponse) -> (String, String) {
    let token = session::create_session_token(&CurrentUser::from(user.clone()), &state.config).expect("Failed to create session token");
    (
        "cookie".to_string(),
        format!("{}={}", state.config.auth.session.cookie_name, token),
    )
}

/// Pull `name=value` out of a `Set-Cookie` header so it can be sent back
pub fn cookie_from_set_cookie(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or_default().trim().to_string()
}

/// A workbook whose first sheet holds one complete lead, with the phone stored as a number, and
/// one row missing its name. A second sheet must be ignored.
pub fn leads_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();

    let leads = workbook.add_worksheet();
    leads.write_string(0, 0, "name").expect("Failed to write header");
    leads.write_string(0, 1, "phone").expect("Failed to write header");
    leads.write_string(0, 2, "email").expect("Failed to write header");
    leads.write_string(1, 0, "A").expect("Failed to write cell");
    leads.write_number(1, 1, 5551234567.0).expect("Failed to write cell");
    leads.write_string(1, 2, "a@x.com").expect("Failed to write cell");
    leads.write_string(2, 1, "2").expect("Failed to write cell");
    leads.write_string(2, 2, "b@x.com").expect("Failed to write cell");

    let notes = workbook.add_worksheet();
    notes.write_string(0, 0, "name").expect("Failed to write header");
    notes.write_string(0, 1, "phone").expect("Failed to write header");
    notes.write_string(0, 2, "email").expect("Failed to write header");
    notes.write_string(1, 0, "Ignored").expect("Failed to write cell");
    notes.write_string(1, 1, "000").expect("Failed to write cell");
    notes.write_string(1, 2, "ignored@x.com").expect("Failed to write cell");

    workbook.save_to_buffer().expect("Failed to build workbook")
}
