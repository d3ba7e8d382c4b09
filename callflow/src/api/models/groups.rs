//! API request/response models for groups.

use crate::db::models::groups::GroupDBResponse;
use crate::types::{GroupId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Request body for creating a new group.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupCreate {
    #[schema(example = "Spring Intake")]
    pub name: String,
}

/// Request body for renaming a group.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupUpdate {
    #[schema(example = "Spring Intake - Week 2")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: GroupId,
    pub name: String,
    /// The user who created (and owns) the group
    #[schema(value_type = String, format = "uuid")]
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for deleting a group
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct DeleteGroupQuery {
    /// The group the client currently has selected
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub selected: Option<GroupId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupDeleteResponse {
    /// Students removed together with the group
    pub students_removed: u64,
    /// Selection after the delete: unchanged if still visible, else the first remaining visible group
    #[schema(value_type = Option<String>, format = "uuid")]
    pub selected_group: Option<GroupId>,
}

impl From<GroupDBResponse> for GroupResponse {
    fn from(db: GroupDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            created_by: db.created_by,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
