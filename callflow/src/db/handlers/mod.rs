//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed SQLx connection (or transaction), provides strongly-typed
//! CRUD operations via the [`Repository`] trait, and returns models from [`crate::db::models`].
//!
//! # Available Repositories
//!
//! - [`Users`]: user accounts, credentials and status
//! - [`Groups`]: groups and their cascade delete
//! - [`Students`]: students and their append-only call history
//!
//! ```ignore
//! use callflow::db::handlers::{Repository, Users};
//!
//! let mut tx = pool.begin().await?;
//! let mut repo = Users::new(&mut tx);
//! let user = repo.get_user_by_email("admin@example.com").await?;
//! tx.commit().await?;
//! ```

pub mod groups;
pub mod repository;
pub mod students;
pub mod users;

pub use groups::Groups;
pub use repository::Repository;
pub use students::Students;
pub use users::Users;
