//! API request and response data models.
//!
//! These structures define the public API contract. They are kept apart from the database
//! models in [`crate::db::models`] and carry `utoipa` annotations for the OpenAPI document.
//!
//! - [`auth`]: login, password change and session responses
//! - [`users`]: users, roles, statuses and the session user
//! - [`groups`]: groups and group deletion
//! - [`students`]: students, call records and import results
//! - [`dashboard`]: the dashboard view and its filters

pub mod auth;
pub mod dashboard;
pub mod groups;
pub mod students;
pub mod users;
