//! Authentication and authorization.
//!
//! Browser sessions only: users sign in at `/authentication/login` with email and password and
//! receive a signed JWT in an HTTP-only cookie. Every protected request re-reads the user record,
//! so role, status and reset-flag changes made by an admin apply on the next request.
//!
//! # Modules
//!
//! - [`current_user`]: extractors for the session user (`CurrentUser`, `ActiveUser`, `AdminUser`)
//! - [`gate`]: login outcomes, password policy and password change rules
//! - [`password`]: Argon2 hashing and temporary password generation
//! - [`session`]: JWT session tokens and the cookie that carries them
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use callflow::auth::current_user::ActiveUser;
//!
//! async fn protected_handler(ActiveUser(user): ActiveUser) -> String {
//!     format!("Hello, {}!", user.name)
//! }
//! ```

pub mod current_user;
pub mod gate;
pub mod password;
pub mod session;
