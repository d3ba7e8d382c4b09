use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::{
        groups::{DeleteGroupQuery, GroupCreate, GroupDeleteResponse, GroupResponse, GroupUpdate},
        users::CurrentUser,
    },
    auth::current_user::ActiveUser,
    changes::{ChangeEvent, ChangeKind},
    db::{
        errors::DbError,
        handlers::{Groups, Repository, groups::GroupFilter},
        models::groups::{GroupCreateDBRequest, GroupDBResponse, GroupUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{Collection, GroupId},
    visibility::{can_manage_group, select_group, visible_groups},
};

pub(crate) fn group_not_found(id: GroupId) -> Error {
    Error::NotFound {
        resource: "Group".to_string(),
        id: id.to_string(),
    }
}

/// Load a group the user may manage. Groups they cannot see are reported as missing.
pub(crate) async fn manageable_group(conn: &mut PgConnection, user: &CurrentUser, id: GroupId) -> Result<GroupDBResponse> {
    match Groups::new(conn).get_by_id(id).await? {
        Some(group) if can_manage_group(user, &group) => Ok(group),
        _ => Err(group_not_found(id)),
    }
}

fn group_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest {
            message: "Group name cannot be empty.".to_string(),
        });
    }
    Ok(name.to_string())
}

#[utoipa::path(
    get,
    path = "/api/v1/groups",
    tag = "groups",
    summary = "List visible groups",
    responses(
        (status = 200, description = "Groups the user may see, oldest first", body = Vec<GroupResponse>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Password reset pending"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_groups(State(state): State<AppState>, ActiveUser(user): ActiveUser) -> Result<Json<Vec<GroupResponse>>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let groups = Groups::new(&mut conn).list(&GroupFilter::default()).await?;

    Ok(Json(visible_groups(&user, groups).into_iter().map(GroupResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups",
    tag = "groups",
    summary = "Create a group",
    request_body = GroupCreate,
    responses(
        (status = 201, description = "Group created", body = GroupResponse),
        (status = 400, description = "Empty name"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_group(
    State(state): State<AppState>,
    ActiveUser(user): ActiveUser,
    Json(request): Json<GroupCreate>,
) -> Result<(StatusCode, Json<GroupResponse>)> {
    let name = group_name(&request.name)?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let group = Groups::new(&mut conn)
        .create(&GroupCreateDBRequest { name, created_by: user.id })
        .await?;

    state
        .changes
        .publish(ChangeEvent::new(Collection::Groups, ChangeKind::Created, group.id).owned_by(group.created_by));

    Ok((StatusCode::CREATED, Json(GroupResponse::from(group))))
}

#[utoipa::path(
    patch,
    path = "/api/v1/groups/{id}",
    tag = "groups",
    summary = "Rename a group",
    request_body = GroupUpdate,
    params(("id" = String, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Group renamed", body = GroupResponse),
        (status = 404, description = "No such group, or not yours"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<GroupId>,
    ActiveUser(user): ActiveUser,
    Json(request): Json<GroupUpdate>,
) -> Result<Json<GroupResponse>> {
    let name = group_name(&request.name)?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    manageable_group(&mut conn, &user, id).await?;
    let group = Groups::new(&mut conn).update(id, &GroupUpdateDBRequest { name }).await?;

    state
        .changes
        .publish(ChangeEvent::new(Collection::Groups, ChangeKind::Updated, group.id).owned_by(group.created_by));

    Ok(Json(GroupResponse::from(group)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/groups/{id}",
    tag = "groups",
    summary = "Delete a group and all of its students",
    params(
        ("id" = String, Path, description = "Group ID"),
        DeleteGroupQuery,
    ),
    responses(
        (status = 200, description = "Group deleted", body = GroupDeleteResponse),
        (status = 404, description = "No such group, or not yours"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_group(
    State(state): State<AppState>,
    Path(id): Path<GroupId>,
    Query(query): Query<DeleteGroupQuery>,
    ActiveUser(user): ActiveUser,
) -> Result<Json<GroupDeleteResponse>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let owner = manageable_group(&mut conn, &user, id).await?.created_by;

    let mut groups = Groups::new(&mut conn);
    let students_removed = groups.delete_with_students(id).await?.ok_or_else(|| group_not_found(id))?;
    let remaining = visible_groups(&user, groups.list(&GroupFilter::default()).await?);

    tracing::info!(group_id = %id, students_removed, "Group deleted");
    state
        .changes
        .publish(ChangeEvent::new(Collection::Groups, ChangeKind::Deleted, id).owned_by(owner));

    Ok(Json(GroupDeleteResponse {
        students_removed,
        selected_group: select_group(query.selected, &remaining),
    }))
}
