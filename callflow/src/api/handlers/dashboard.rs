use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    api::models::dashboard::{DashboardQuery, DashboardResponse},
    auth::current_user::ActiveUser,
    dashboard::build_dashboard,
    db::{
        errors::DbError,
        handlers::{Groups, Repository, Students, groups::GroupFilter, students::StudentFilter},
    },
    errors::Result,
    visibility::{visible, visible_groups},
};

#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    tag = "dashboard",
    summary = "Dashboard for the signed-in user",
    description = "Visible groups, the selected group's students filtered by status, per-status counts \
                   for the selected group and the total number of calls across every visible student.",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Dashboard data", body = DashboardResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Password reset pending"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
    ActiveUser(user): ActiveUser,
) -> Result<Json<DashboardResponse>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;

    let groups = visible_groups(&user, Groups::new(&mut conn).list(&GroupFilter::default()).await?);
    let group_ids = groups.iter().map(|g| g.id).collect();
    let students = Students::new(&mut conn).list(&StudentFilter::in_groups(group_ids)).await?;

    let dashboard = build_dashboard(
        visible(&user, groups, students),
        query.selected_group,
        query.status.unwrap_or_default(),
    );

    Ok(Json(dashboard))
}
