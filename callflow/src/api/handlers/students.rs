use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::{
        handlers::groups::manageable_group,
        models::{
            students::{CallRecordCreate, CallRecordResponse, ImportResponse, ListStudentsQuery, StudentCreate, StudentResponse, StudentUpdate},
            users::CurrentUser,
        },
    },
    auth::current_user::ActiveUser,
    changes::{ChangeEvent, ChangeKind},
    db::{
        errors::DbError,
        handlers::{Groups, Repository, Students, groups::GroupFilter, students::StudentFilter},
        models::{
            groups::GroupDBResponse,
            students::{StudentCreateDBRequest, StudentDBResponse, StudentUpdateDBRequest},
        },
    },
    errors::{Error, Result},
    import::{self, SpreadsheetFormat},
    types::{Collection, GroupId, StudentId},
    visibility::{can_manage_group, visible_groups},
};

fn student_not_found(id: StudentId) -> Error {
    Error::NotFound {
        resource: "Student".to_string(),
        id: id.to_string(),
    }
}

/// Load a student whose group the user may manage, along with that group. Anything else is
/// reported as missing.
async fn manageable_student(conn: &mut PgConnection, user: &CurrentUser, id: StudentId) -> Result<(StudentDBResponse, GroupDBResponse)> {
    let student = Students::new(&mut *conn).get_by_id(id).await?.ok_or_else(|| student_not_found(id))?;

    match Groups::new(&mut *conn).get_by_id(student.group_id).await? {
        Some(group) if can_manage_group(user, &group) => Ok((student, group)),
        _ => Err(student_not_found(id)),
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::BadRequest {
            message: format!("Student {field} cannot be empty."),
        });
    }
    Ok(value.to_string())
}

fn optional(field: &str, value: Option<String>) -> Result<Option<String>> {
    value.map(|v| required(field, &v)).transpose()
}

#[utoipa::path(
    get,
    path = "/api/v1/students",
    tag = "students",
    summary = "List visible students",
    params(ListStudentsQuery),
    responses(
        (status = 200, description = "Students in the user's visible groups", body = Vec<StudentResponse>),
        (status = 403, description = "Password reset pending"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_students(
    State(state): State<AppState>,
    Query(query): Query<ListStudentsQuery>,
    ActiveUser(user): ActiveUser,
) -> Result<Json<Vec<StudentResponse>>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let groups = visible_groups(&user, Groups::new(&mut conn).list(&GroupFilter::default()).await?);

    let group_ids: Vec<GroupId> = groups
        .iter()
        .map(|g| g.id)
        .filter(|id| query.group_id.is_none_or(|wanted| wanted == *id))
        .collect();
    let students = Students::new(&mut conn).list(&StudentFilter::in_groups(group_ids)).await?;

    Ok(Json(students.into_iter().map(StudentResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups/{id}/students",
    tag = "students",
    summary = "Add a student to a group",
    request_body = StudentCreate,
    params(("id" = String, Path, description = "Group ID")),
    responses(
        (status = 201, description = "Student created", body = StudentResponse),
        (status = 400, description = "Missing name, phone or email"),
        (status = 404, description = "No such group, or not yours"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_student(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    ActiveUser(user): ActiveUser,
    Json(request): Json<StudentCreate>,
) -> Result<(StatusCode, Json<StudentResponse>)> {
    let request = StudentCreate {
        name: required("name", &request.name)?,
        phone: required("phone", &request.phone)?,
        email: required("email", &request.email)?,
    };

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let group = manageable_group(&mut conn, &user, group_id).await?;
    let student = Students::new(&mut conn)
        .create(&StudentCreateDBRequest::new(request, group_id, user.id))
        .await?;

    state
        .changes
        .publish(ChangeEvent::new(Collection::Students, ChangeKind::Created, student.id).owned_by(group.created_by));

    Ok((StatusCode::CREATED, Json(StudentResponse::from(student))))
}

#[utoipa::path(
    patch,
    path = "/api/v1/students/{id}",
    tag = "students",
    summary = "Edit a student",
    request_body = StudentUpdate,
    params(("id" = String, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student updated", body = StudentResponse),
        (status = 404, description = "No such student, or not yours"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<StudentId>,
    ActiveUser(user): ActiveUser,
    Json(request): Json<StudentUpdate>,
) -> Result<Json<StudentResponse>> {
    let request = StudentUpdate {
        name: optional("name", request.name)?,
        phone: optional("phone", request.phone)?,
        email: optional("email", request.email)?,
    };

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let (_, group) = manageable_student(&mut conn, &user, id).await?;
    let student = Students::new(&mut conn).update(id, &StudentUpdateDBRequest::from(request)).await?;

    state
        .changes
        .publish(ChangeEvent::new(Collection::Students, ChangeKind::Updated, student.id).owned_by(group.created_by));

    Ok(Json(StudentResponse::from(student)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/students/{id}",
    tag = "students",
    summary = "Delete a student",
    params(("id" = String, Path, description = "Student ID")),
    responses(
        (status = 204, description = "Student deleted"),
        (status = 404, description = "No such student, or not yours"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_student(State(state): State<AppState>, Path(id): Path<StudentId>, ActiveUser(user): ActiveUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let (_, group) = manageable_student(&mut conn, &user, id).await?;

    if !Students::new(&mut conn).delete(id).await? {
        return Err(student_not_found(id));
    }

    state
        .changes
        .publish(ChangeEvent::new(Collection::Students, ChangeKind::Deleted, id).owned_by(group.created_by));

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/students/{id}/calls",
    tag = "students",
    summary = "Log a call outcome",
    request_body = CallRecordCreate,
    params(("id" = String, Path, description = "Student ID")),
    responses(
        (status = 201, description = "Call recorded", body = CallRecordResponse),
        (status = 404, description = "No such student, or not yours"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn record_call(
    State(state): State<AppState>,
    Path(id): Path<StudentId>,
    ActiveUser(user): ActiveUser,
    Json(request): Json<CallRecordCreate>,
) -> Result<(StatusCode, Json<CallRecordResponse>)> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let (_, group) = manageable_student(&mut conn, &user, id).await?;
    let record = Students::new(&mut conn).append_call(id, request.status).await?;

    state
        .changes
        .publish(ChangeEvent::new(Collection::Students, ChangeKind::Updated, id).owned_by(group.created_by));

    Ok((StatusCode::CREATED, Json(CallRecordResponse::from(record))))
}

/// Read the `file` field of an upload, enforcing the size limit as chunks arrive
async fn read_upload(multipart: &mut Multipart, max_file_size: usize) -> Result<(SpreadsheetFormat, Vec<u8>)> {
    let too_large = || Error::PayloadTooLarge {
        message: format!(
            "File size exceeds maximum allowed size of {} bytes ({} MB)",
            max_file_size,
            max_file_size / (1024 * 1024)
        ),
    };
    let multipart_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            too_large()
        } else {
            Error::BadRequest {
                message: format!("Failed to parse multipart data: {e}"),
            }
        }
    };

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let format = SpreadsheetFormat::detect(field.file_name(), field.content_type())?;
        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if bytes.len() + chunk.len() > max_file_size {
                tracing::warn!(max_file_size, "Import file size limit exceeded, aborting upload");
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }
        return Ok((format, bytes));
    }

    Err(Error::BadRequest {
        message: "No file uploaded. Send the spreadsheet in a multipart field named 'file'.".to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/groups/{id}/students/import",
    tag = "students",
    summary = "Import students from a spreadsheet",
    description = "Upload an .xlsx or .csv file whose header row names `name`, `phone` and `email`. \
                   Rows missing any of them are skipped; the rest are added to the group in one transaction.",
    request_body(content_type = "multipart/form-data", description = "Spreadsheet in a field named `file`"),
    params(("id" = String, Path, description = "Group ID")),
    responses(
        (status = 201, description = "Students imported", body = ImportResponse),
        (status = 400, description = "Empty file, no valid rows, or unreadable spreadsheet"),
        (status = 404, description = "No such group, or not yours"),
        (status = 413, description = "File too large"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn import_students(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    ActiveUser(user): ActiveUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ImportResponse>)> {
    // No connection is held while the upload streams in or the sheet is parsed
    let owner = {
        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        manageable_group(&mut conn, &user, group_id).await?.created_by
    };

    let (format, bytes) = read_upload(&mut multipart, state.config.import.max_file_size).await?;
    if bytes.is_empty() {
        return Err(import::ImportError::EmptyFile.into());
    }

    let sheet = tokio::task::spawn_blocking(move || import::parse_spreadsheet(&bytes, format))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn spreadsheet parsing task: {e}"),
        })??;

    let requests: Vec<StudentCreateDBRequest> = sheet
        .students
        .into_iter()
        .map(|row| StudentCreateDBRequest {
            name: row.name,
            phone: row.phone,
            email: row.email,
            group_id,
            created_by: user.id,
        })
        .collect();
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let created = Students::new(&mut conn).create_many(&requests).await?;

    tracing::info!(
        group_id = %group_id,
        students_added = created.len(),
        rows_skipped = sheet.rows_skipped,
        "Students imported"
    );
    for student in &created {
        state
            .changes
            .publish(ChangeEvent::new(Collection::Students, ChangeKind::Created, student.id).owned_by(owner));
    }

    Ok((
        StatusCode::CREATED,
        Json(ImportResponse {
            students_added: created.len() as u64,
            rows_skipped: sheet.rows_skipped,
        }),
    ))
}
