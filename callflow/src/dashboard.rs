//! What the dashboard shows for a user, computed from their visible groups and students.

use std::cmp::Ordering;

use crate::api::models::dashboard::{DashboardResponse, StatusCounts, StatusFilter};
use crate::api::models::groups::GroupResponse;
use crate::api::models::students::StudentResponse;
use crate::db::models::students::StudentDBResponse;
use crate::types::GroupId;
use crate::visibility::{Visible, select_group};

/// Most recent call first; students never called go last, in their original order
fn by_last_call_desc(a: &StudentDBResponse, b: &StudentDBResponse) -> Ordering {
    match (a.last_call(), b.last_call()) {
        (Some(a), Some(b)) => b.timestamp.cmp(&a.timestamp),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn build_dashboard(visible: Visible, selected: Option<GroupId>, filter: StatusFilter) -> DashboardResponse {
    let selected_group = select_group(selected, &visible.groups);

    let total_calls = visible.students.iter().map(|s| s.call_history.len() as u64).sum();

    let mut status_counts = StatusCounts::default();
    let mut students: Vec<StudentDBResponse> = Vec::new();
    for student in visible.students {
        if Some(student.group_id) != selected_group {
            continue;
        }
        let status = student.current_status();
        status_counts.record(status);
        if filter.matches(status) {
            students.push(student);
        }
    }
    students.sort_by(by_last_call_desc);

    DashboardResponse {
        groups: visible.groups.into_iter().map(GroupResponse::from).collect(),
        selected_group,
        students: students.into_iter().map(StudentResponse::from).collect(),
        status_counts,
        total_calls,
    }
}
