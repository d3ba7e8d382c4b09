//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication** (`/authentication/*`): login, logout, session user, profile, password change
//! - **Users** (`/api/v1/users/*`): admin-only user administration
//! - **Groups** (`/api/v1/groups/*`): group CRUD, student creation and spreadsheet import
//! - **Students** (`/api/v1/students/*`): student edits and call logging
//! - **Dashboard** (`/api/v1/dashboard`): the per-user dashboard view
//! - **Events** (`/api/v1/events`): server-sent change notifications
//!
//! API documentation is available at `/docs` when the server is running.

pub mod handlers;
pub mod models;
