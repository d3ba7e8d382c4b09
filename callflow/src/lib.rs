//! # callflow: lead call tracking backend
//!
//! `callflow` is the server side of a small call center tool. Agents work through lists of
//! prospective students, call them, and record the outcome of each call. Admins manage the
//! agent accounts.
//!
//! ## Overview
//!
//! Students live in named groups. Every group belongs to the user who created it: agents see and
//! manage only their own groups and the students in them, while admins see everything. Each call
//! attempt is appended to the student's call history, and the latest outcome becomes the
//! student's status on the dashboard.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum) and all state is in PostgreSQL.
//!
//! ### Request Flow
//!
//! Browser clients sign in at `/authentication/login` and receive a signed session cookie. Each
//! request to `/api/v1/*` resolves that cookie to a fresh user record through the extractors in
//! [`auth::current_user`], so an admin's changes to a user apply on that user's next request.
//! Handlers then apply the visibility rules in [`visibility`], talk to PostgreSQL through the
//! repositories in [`db::handlers`], and publish a [`changes::ChangeEvent`] after every write so
//! that connected clients (subscribed to `/api/v1/events`) can refresh.
//!
//! ### Core Components
//!
//! - [`api`]: request handlers and request/response models
//! - [`auth`]: sessions, password hashing and the login/password-change rules
//! - [`db`]: repositories and database records
//! - [`import`]: spreadsheet parsing for bulk student import
//! - [`dashboard`]: the per-user dashboard view
//! - [`changes`]: in-process change notifications
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use callflow::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = callflow::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     callflow::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod changes;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod errors;
pub mod import;
mod openapi;
pub mod telemetry;
pub mod types;
pub mod visibility;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::models::users::{Role, UserStatus},
    auth::password::{self, Argon2Params},
    changes::ChangeFeed,
    db::{
        handlers::{Repository, Users},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    openapi::ApiDoc,
};
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{delete, get, patch, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{GroupId, StudentId, UserId};

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder().db(pool).config(config).build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    #[builder(default)]
    pub changes: ChangeFeed,
}

/// Get the callflow database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Make sure the configured admin account exists.
///
/// A missing admin is created active, with the configured password and no pending reset. An
/// existing account only has its password refreshed, and only when one is configured.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(config: &Config, db: &PgPool) -> anyhow::Result<UserId> {
    let password_hash = match config.admin_password.clone() {
        Some(pwd) => Some(password::hash_blocking(pwd, Argon2Params::from(&config.auth.password)).await?),
        None => None,
    };

    let mut tx = db.begin().await?;
    let mut users = Users::new(&mut tx);

    if let Some(existing) = users.get_user_by_email(&config.admin_email).await? {
        if let Some(password_hash) = password_hash {
            users
                .update(existing.id, &UserUpdateDBRequest::password(password_hash, false))
                .await?;
            debug!(user_id = %existing.id, "Refreshed initial admin password");
        }
        tx.commit().await?;
        return Ok(existing.id);
    }

    if password_hash.is_none() {
        tracing::warn!("No admin_password configured; the initial admin cannot sign in until one is set");
    }

    let created = users
        .create(&UserCreateDBRequest {
            name: config.admin_name.clone(),
            email: config.admin_email.clone(),
            role: Role::Admin,
            status: UserStatus::Active,
            password_hash,
            password_reset_required: false,
        })
        .await?;

    tx.commit().await?;
    info!(email = %config.admin_email, "Created initial admin user");
    Ok(created.id)
}

async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;
    let optional = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(optional(settings.idle_timeout_secs))
        .max_lifetime(optional(settings.max_lifetime_secs))
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;

    create_initial_admin_user(config, &pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {}", e))?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allow_origin = if config.auth.cors.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.auth.cors.allowed_origins {
            origins.push(origin.parse::<HeaderValue>()?);
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::PATCH, http::Method::DELETE])
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_credentials(config.auth.cors.allow_credentials);

    if let Some(max_age) = config.auth.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router: authentication and API routes, health check, API docs, CORS
/// and request tracing.
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let auth_routes = Router::new()
        .route("/authentication/login", post(api::handlers::auth::login))
        .route("/authentication/logout", post(api::handlers::auth::logout))
        .route("/authentication/me", get(api::handlers::auth::me))
        .route("/authentication/profile", patch(api::handlers::auth::update_profile))
        .route("/authentication/password-change", post(api::handlers::auth::change_password));

    // The import route gets a body limit sized to the configured file limit
    let import_limit = state.config.import.max_file_size + MULTIPART_OVERHEAD;
    let import_router = Router::new().route(
        "/groups/{id}/students/import",
        post(api::handlers::students::import_students).layer(DefaultBodyLimit::max(import_limit)),
    );

    let api_routes = Router::new()
        // User administration
        .route("/users", get(api::handlers::users::list_users))
        .route("/users", post(api::handlers::users::create_user))
        .route("/users/{id}", get(api::handlers::users::get_user))
        .route("/users/{id}", patch(api::handlers::users::update_user))
        .route("/users/{id}", delete(api::handlers::users::delete_user))
        .route("/users/{id}/reset-password", post(api::handlers::users::reset_password))
        .route("/users/{id}/toggle-status", post(api::handlers::users::toggle_status))
        // Groups
        .route("/groups", get(api::handlers::groups::list_groups))
        .route("/groups", post(api::handlers::groups::create_group))
        .route("/groups/{id}", patch(api::handlers::groups::update_group))
        .route("/groups/{id}", delete(api::handlers::groups::delete_group))
        // Students
        .merge(import_router)
        .route("/groups/{id}/students", post(api::handlers::students::create_student))
        .route("/students", get(api::handlers::students::list_students))
        .route("/students/{id}", patch(api::handlers::students::update_student))
        .route("/students/{id}", delete(api::handlers::students::delete_student))
        .route("/students/{id}/calls", post(api::handlers::students::record_call))
        // Views
        .route("/dashboard", get(api::handlers::dashboard::get_dashboard))
        .route("/events", get(api::handlers::events::stream_changes));

    let router = Router::new()
        .merge(auth_routes)
        .nest("/api/v1", api_routes)
        .with_state(state.clone())
        .route("/healthz", get(|| async { "OK" }))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(create_cors_layer(&state.config)?)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// The HTTP server and the resources it owns
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Connect to the database, run migrations, ensure the initial admin and build the router
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(bind_address = %config.bind_address(), "Starting callflow");

        let pool = setup_database(&config).await?;

        let state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("CallFlow listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        api::models::auth::{AuthResponse, LoginRequest},
        auth::gate::Destination,
        test_utils::{create_test_app, create_test_config},
    };
    use axum::http::StatusCode;

    fn admin_config(password: Option<&str>) -> Config {
        let mut config = create_test_config();
        config.admin_email = "boss@example.com".to_string();
        config.admin_name = "The Boss".to_string();
        config.admin_password = password.map(str::to_string);
        config
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_initial_admin_is_created_active(pool: PgPool) {
        let config = admin_config(Some("first-password"));
        let id = create_initial_admin_user(&config, &pool).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let admin = Users::new(&mut conn).get_by_id(id).await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.status, UserStatus::Active);
        assert_eq!(admin.name, "The Boss");
        assert!(!admin.password_reset_required);
        let hash = admin.password_hash.unwrap();
        assert!(password::verify_string("first-password", &hash).unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_initial_admin_password_is_refreshed(pool: PgPool) {
        let first = create_initial_admin_user(&admin_config(Some("first-password")), &pool).await.unwrap();
        let second = create_initial_admin_user(&admin_config(Some("second-password")), &pool).await.unwrap();
        assert_eq!(first, second);

        // Without a configured password the stored one is left alone
        create_initial_admin_user(&admin_config(None), &pool).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let admin = Users::new(&mut conn).get_by_id(first).await.unwrap().unwrap();
        let hash = admin.password_hash.unwrap();
        assert!(password::verify_string("second-password", &hash).unwrap());
        assert!(!password::verify_string("first-password", &hash).unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_initial_admin_can_sign_in(pool: PgPool) {
        let config = admin_config(Some("first-password"));
        create_initial_admin_user(&config, &pool).await.unwrap();
        let (server, _) = create_test_app(pool);

        let response = server
            .post("/authentication/login")
            .json(&LoginRequest {
                email: "boss@example.com".to_string(),
                password: "first-password".to_string(),
            })
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<AuthResponse>().destination, Destination::Dashboard);
    }

    #[sqlx::test]
    async fn test_healthz_and_docs(pool: PgPool) {
        let (server, _) = create_test_app(pool);

        let response = server.get("/healthz").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "OK");

        let doc: serde_json::Value = server.get("/openapi.json").await.json();
        assert_eq!(doc["info"]["title"], "CallFlow API");

        server.get("/docs").await.assert_status(StatusCode::OK);
    }

    #[test]
    fn test_invalid_cors_origin_fails_router_build() {
        let mut config = create_test_config();
        config.auth.cors.allowed_origins = vec!["not a\nheader".to_string()];
        assert!(create_cors_layer(&config).is_err());
    }
}
