//! Role-scoped visibility of groups and students.
//!
//! Admins see everything. Everyone else sees the groups they created and the students inside
//! those groups. Nothing here touches the database: callers load the collections and this module
//! decides what the session user may see, recomputed per request.

use std::collections::HashSet;

use crate::api::models::users::CurrentUser;
use crate::db::models::{groups::GroupDBResponse, students::StudentDBResponse};
use crate::types::GroupId;

/// The slice of the collections a user may see. Input order is preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct Visible {
    pub groups: Vec<GroupDBResponse>,
    pub students: Vec<StudentDBResponse>,
}

pub fn visible(user: &CurrentUser, groups: Vec<GroupDBResponse>, students: Vec<StudentDBResponse>) -> Visible {
    if user.is_admin() {
        return Visible { groups, students };
    }

    let groups: Vec<GroupDBResponse> = groups.into_iter().filter(|g| g.created_by == user.id).collect();
    let group_ids: HashSet<GroupId> = groups.iter().map(|g| g.id).collect();
    let students = students.into_iter().filter(|s| group_ids.contains(&s.group_id)).collect();

    Visible { groups, students }
}

/// Groups only; the same rule as [`visible`]
pub fn visible_groups(user: &CurrentUser, groups: Vec<GroupDBResponse>) -> Vec<GroupDBResponse> {
    visible(user, groups, Vec::new()).groups
}

/// Rename, delete, and every student write inside the group
pub fn can_manage_group(user: &CurrentUser, group: &GroupDBResponse) -> bool {
    user.is_admin() || group.created_by == user.id
}

/// Keep `current` while it is still visible, else fall back to the first visible group.
pub fn select_group(current: Option<GroupId>, visible_groups: &[GroupDBResponse]) -> Option<GroupId> {
    current
        .filter(|id| visible_groups.iter().any(|g| g.id == *id))
        .or_else(|| visible_groups.first().map(|g| g.id))
}
