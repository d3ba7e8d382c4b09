//! API models for the dashboard view.

use crate::api::models::groups::GroupResponse;
use crate::api::models::students::{StudentResponse, StudentStatus};
use crate::types::GroupId;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Which students to show, by current status
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum StatusFilter {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "Not Called")]
    NotCalled,
    Called,
    Voicemail,
    #[serde(rename = "Missed Call")]
    MissedCall,
}

impl StatusFilter {
    pub fn matches(self, status: StudentStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::NotCalled => status == StudentStatus::NotCalled,
            StatusFilter::Called => status == StudentStatus::Called,
            StatusFilter::Voicemail => status == StudentStatus::Voicemail,
            StatusFilter::MissedCall => status == StudentStatus::MissedCall,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct DashboardQuery {
    /// The group the client has selected; falls back to the first visible group
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub selected_group: Option<GroupId>,
    /// Defaults to `all`
    #[param(value_type = Option<String>)]
    pub status: Option<StatusFilter>,
}

/// Students in the selected group per current status
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct StatusCounts {
    #[serde(rename = "Not Called")]
    pub not_called: u64,
    #[serde(rename = "Called")]
    pub called: u64,
    #[serde(rename = "Voicemail")]
    pub voicemail: u64,
    #[serde(rename = "Missed Call")]
    pub missed_call: u64,
}

impl StatusCounts {
    pub fn record(&mut self, status: StudentStatus) {
        match status {
            StudentStatus::NotCalled => self.not_called += 1,
            StudentStatus::Called => self.called += 1,
            StudentStatus::Voicemail => self.voicemail += 1,
            StudentStatus::MissedCall => self.missed_call += 1,
        }
    }

    pub fn get(&self, status: StudentStatus) -> u64 {
        match status {
            StudentStatus::NotCalled => self.not_called,
            StudentStatus::Called => self.called,
            StudentStatus::Voicemail => self.voicemail,
            StudentStatus::MissedCall => self.missed_call,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub groups: Vec<GroupResponse>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub selected_group: Option<GroupId>,
    /// Filtered students of the selected group, most recently called first
    pub students: Vec<StudentResponse>,
    pub status_counts: StatusCounts,
    /// Call records across every visible student
    pub total_calls: u64,
}
