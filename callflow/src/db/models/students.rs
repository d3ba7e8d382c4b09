//! Database models for students and call records.

use crate::api::models::students::{CallStatus, StudentCreate, StudentStatus, StudentUpdate};
use crate::types::{GroupId, StudentId, UserId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct StudentCreateDBRequest {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub group_id: GroupId,
    pub created_by: UserId,
}

impl StudentCreateDBRequest {
    pub fn new(api: StudentCreate, group_id: GroupId, created_by: UserId) -> Self {
        Self {
            name: api.name,
            phone: api.phone,
            email: api.email,
            group_id,
            created_by,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StudentUpdateDBRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl From<StudentUpdate> for StudentUpdateDBRequest {
    fn from(api: StudentUpdate) -> Self {
        Self {
            name: api.name,
            phone: api.phone,
            email: api.email,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub status: CallStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentDBResponse {
    pub id: StudentId,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub group_id: GroupId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Oldest first
    pub call_history: Vec<CallRecord>,
}

impl StudentDBResponse {
    pub fn last_call(&self) -> Option<&CallRecord> {
        self.call_history.last()
    }

    pub fn current_status(&self) -> StudentStatus {
        self.last_call()
            .map(|record| StudentStatus::from(record.status))
            .unwrap_or(StudentStatus::NotCalled)
    }
}
