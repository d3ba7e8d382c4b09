//! Database models for groups.

use crate::types::{GroupId, UserId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct GroupCreateDBRequest {
    pub name: String,
    pub created_by: UserId,
}

#[derive(Debug, Clone)]
pub struct GroupUpdateDBRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupDBResponse {
    pub id: GroupId,
    pub name: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
