//! Database record structures and request types for the repositories.

pub mod groups;
pub mod students;
pub mod users;
