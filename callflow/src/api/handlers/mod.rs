//! HTTP request handlers, organized by resource.
//!
//! - [`auth`]: login, logout, session user, profile and password change
//! - [`users`]: admin-only user administration
//! - [`groups`]: group CRUD
//! - [`students`]: student CRUD, call logging and spreadsheet import
//! - [`dashboard`]: the dashboard view
//! - [`events`]: server-sent change notifications
//!
//! Handlers take one of the extractors in [`crate::auth::current_user`] to get the session user.
//! Which one they take decides who may call them.

pub mod auth;
pub mod dashboard;
pub mod events;
pub mod groups;
pub mod students;
pub mod users;
