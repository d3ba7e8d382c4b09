//! API request/response models for students and their call history.

use crate::db::models::students::{CallRecord, StudentDBResponse};
use crate::types::{GroupId, StudentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Outcome of a single call attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "call_outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    Called,
    Voicemail,
    #[serde(rename = "Missed Call")]
    MissedCall,
}

/// What a student's row shows: the last call outcome, or `Not Called` with no history
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub enum StudentStatus {
    #[serde(rename = "Not Called")]
    NotCalled,
    Called,
    Voicemail,
    #[serde(rename = "Missed Call")]
    MissedCall,
}

impl StudentStatus {
    pub const ALL: [StudentStatus; 4] = [
        StudentStatus::NotCalled,
        StudentStatus::Called,
        StudentStatus::Voicemail,
        StudentStatus::MissedCall,
    ];
}

impl From<CallStatus> for StudentStatus {
    fn from(status: CallStatus) -> Self {
        match status {
            CallStatus::Called => StudentStatus::Called,
            CallStatus::Voicemail => StudentStatus::Voicemail,
            CallStatus::MissedCall => StudentStatus::MissedCall,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentCreate {
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[schema(example = "+44 20 7946 0000")]
    pub phone: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StudentUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CallRecordCreate {
    pub status: CallStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct CallRecordResponse {
    pub status: CallStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: StudentId,
    pub name: String,
    pub phone: String,
    pub email: String,
    #[schema(value_type = String, format = "uuid")]
    pub group_id: GroupId,
    #[schema(value_type = String, format = "uuid")]
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    /// Oldest first
    pub call_history: Vec<CallRecordResponse>,
    pub status: StudentStatus,
}

/// Query parameters for listing students
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListStudentsQuery {
    /// Only students of this group
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub group_id: Option<GroupId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImportResponse {
    pub students_added: u64,
    pub rows_skipped: u64,
}

impl From<CallRecord> for CallRecordResponse {
    fn from(record: CallRecord) -> Self {
        Self {
            status: record.status,
            timestamp: record.timestamp,
        }
    }
}

impl From<StudentDBResponse> for StudentResponse {
    fn from(db: StudentDBResponse) -> Self {
        let status = db.current_status();
        Self {
            id: db.id,
            name: db.name,
            phone: db.phone,
            email: db.email,
            group_id: db.group_id,
            created_by: db.created_by,
            created_at: db.created_at,
            call_history: db.call_history.into_iter().map(CallRecordResponse::from).collect(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&CallStatus::MissedCall).unwrap(), "\"Missed Call\"");
        assert_eq!(serde_json::to_string(&StudentStatus::NotCalled).unwrap(), "\"Not Called\"");
        let parsed: CallRecordCreate = serde_json::from_str(r#"{"status":"Voicemail"}"#).unwrap();
        assert_eq!(parsed.status, CallStatus::Voicemail);
    }

    #[test]
    fn test_not_called_cannot_be_recorded() {
        assert!(serde_json::from_str::<CallRecordCreate>(r#"{"status":"Not Called"}"#).is_err());
    }
}
