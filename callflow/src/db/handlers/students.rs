//! Database repository for students and their append-only call history.

use crate::api::models::students::CallStatus;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::students::{CallRecord, StudentCreateDBRequest, StudentDBResponse, StudentUpdateDBRequest},
};
use crate::types::{GroupId, StudentId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing students
#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    /// Restrict to students in these groups. `None` means every group.
    pub group_ids: Option<Vec<GroupId>>,
}

impl StudentFilter {
    pub fn in_groups(group_ids: Vec<GroupId>) -> Self {
        Self { group_ids: Some(group_ids) }
    }
}

#[derive(Debug, Clone, FromRow)]
struct Student {
    pub id: StudentId,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub group_id: GroupId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct CallRecordRow {
    pub student_id: StudentId,
    pub status: CallStatus,
    pub recorded_at: DateTime<Utc>,
}

impl From<CallRecordRow> for CallRecord {
    fn from(row: CallRecordRow) -> Self {
        Self {
            status: row.status,
            timestamp: row.recorded_at,
        }
    }
}

impl From<(Student, Vec<CallRecord>)> for StudentDBResponse {
    fn from((student, call_history): (Student, Vec<CallRecord>)) -> Self {
        Self {
            id: student.id,
            name: student.name,
            phone: student.phone,
            email: student.email,
            group_id: student.group_id,
            created_by: student.created_by,
            created_at: student.created_at,
            updated_at: student.updated_at,
            call_history,
        }
    }
}

const STUDENT_COLUMNS: &str = "id, name, phone, email, group_id, created_by, created_at, updated_at";

pub struct Students<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Students<'c> {
    type CreateRequest = StudentCreateDBRequest;
    type UpdateRequest = StudentUpdateDBRequest;
    type Response = StudentDBResponse;
    type Id = StudentId;
    type Filter = StudentFilter;

    #[instrument(skip(self, request), fields(group_id = %abbrev_uuid(&request.group_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let student = insert_student(&mut *self.db, request).await?;
        Ok(StudentDBResponse::from((student, Vec::new())))
    }

    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let student = sqlx::query_as::<_, Student>(&format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match student {
            Some(student) => {
                let mut history = self.load_history(&[student.id]).await?;
                let calls = history.remove(&student.id).unwrap_or_default();
                Ok(Some(StudentDBResponse::from((student, calls))))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let students = match &filter.group_ids {
            Some(group_ids) if group_ids.is_empty() => return Ok(Vec::new()),
            Some(group_ids) => {
                sqlx::query_as::<_, Student>(&format!(
                    "SELECT {STUDENT_COLUMNS} FROM students WHERE group_id = ANY($1) ORDER BY created_at ASC, id ASC"
                ))
                .bind(group_ids.as_slice())
                .fetch_all(&mut *self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Student>(&format!("SELECT {STUDENT_COLUMNS} FROM students ORDER BY created_at ASC, id ASC"))
                    .fetch_all(&mut *self.db)
                    .await?
            }
        };

        self.attach_history(students).await
    }

    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(student_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let student = sqlx::query_as::<_, Student>(&format!(
            r#"
            UPDATE students SET
                name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                email = COALESCE($4, email),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {STUDENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.name)
        .bind(&request.phone)
        .bind(&request.email)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        let mut history = self.load_history(&[student.id]).await?;
        let calls = history.remove(&student.id).unwrap_or_default();
        Ok(StudentDBResponse::from((student, calls)))
    }
}

async fn insert_student(conn: &mut PgConnection, request: &StudentCreateDBRequest) -> Result<Student> {
    let student = sqlx::query_as::<_, Student>(&format!(
        r#"
        INSERT INTO students (id, name, phone, email, group_id, created_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {STUDENT_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(&request.name)
    .bind(&request.phone)
    .bind(&request.email)
    .bind(request.group_id)
    .bind(request.created_by)
    .fetch_one(conn)
    .await?;

    Ok(student)
}

impl<'c> Students<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert many students atomically: either every row lands or none do.
    #[instrument(skip(self, requests), fields(count = requests.len()), err)]
    pub async fn create_many(&mut self, requests: &[StudentCreateDBRequest]) -> Result<Vec<StudentDBResponse>> {
        let mut tx = self.db.begin().await?;

        let mut created = Vec::with_capacity(requests.len());
        for request in requests {
            let student = insert_student(&mut *tx, request).await?;
            created.push(StudentDBResponse::from((student, Vec::new())));
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Append a call outcome to a student's history. Earlier records are never touched.
    #[instrument(skip(self), fields(student_id = %abbrev_uuid(&student_id)), err)]
    pub async fn append_call(&mut self, student_id: StudentId, status: CallStatus) -> Result<CallRecord> {
        let row = sqlx::query_as::<_, CallRecordRow>(
            r#"
            INSERT INTO call_records (student_id, status)
            VALUES ($1, $2)
            RETURNING student_id, status, recorded_at
            "#,
        )
        .bind(student_id)
        .bind(status)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(CallRecord::from(row))
    }

    async fn load_history(&mut self, ids: &[StudentId]) -> Result<HashMap<StudentId, Vec<CallRecord>>> {
        let rows = sqlx::query_as::<_, CallRecordRow>(
            "SELECT student_id, status, recorded_at FROM call_records WHERE student_id = ANY($1) ORDER BY student_id, id ASC",
        )
        .bind(ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut history: HashMap<StudentId, Vec<CallRecord>> = HashMap::new();
        for row in rows {
            history.entry(row.student_id).or_default().push(CallRecord::from(row));
        }
        Ok(history)
    }

    async fn attach_history(&mut self, students: Vec<Student>) -> Result<Vec<StudentDBResponse>> {
        if students.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<StudentId> = students.iter().map(|s| s.id).collect();
        let mut history = self.load_history(&ids).await?;

        Ok(students
            .into_iter()
            .map(|student| {
                let calls = history.remove(&student.id).unwrap_or_default();
                StudentDBResponse::from((student, calls))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::students::StudentStatus;
    use crate::api::models::users::Role;
    use crate::test_utils::{create_test_group, create_test_user};
    use sqlx::PgPool;

    fn student(name: &str, group_id: GroupId, created_by: UserId) -> StudentCreateDBRequest {
        StudentCreateDBRequest {
            name: name.to_string(),
            phone: "555-0100".to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            group_id,
            created_by,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_append_call_preserves_history(pool: PgPool) {
        let owner = create_test_user(&pool, Role::User).await;
        let group = create_test_group(&pool, owner.id, "Leads").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Students::new(&mut conn);

        let created = repo.create(&student("Ada", group.id, owner.id)).await.unwrap();
        assert_eq!(created.current_status(), StudentStatus::NotCalled);

        let first = repo.append_call(created.id, CallStatus::MissedCall).await.unwrap();
        repo.append_call(created.id, CallStatus::Voicemail).await.unwrap();
        repo.append_call(created.id, CallStatus::Called).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        let statuses: Vec<CallStatus> = fetched.call_history.iter().map(|c| c.status).collect();
        assert_eq!(statuses, vec![CallStatus::MissedCall, CallStatus::Voicemail, CallStatus::Called]);
        assert_eq!(fetched.call_history[0], first);
        assert_eq!(fetched.current_status(), StudentStatus::Called);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_by_group(pool: PgPool) {
        let owner = create_test_user(&pool, Role::User).await;
        let g1 = create_test_group(&pool, owner.id, "One").await;
        let g2 = create_test_group(&pool, owner.id, "Two").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Students::new(&mut conn);

        repo.create(&student("A", g1.id, owner.id)).await.unwrap();
        repo.create(&student("B", g2.id, owner.id)).await.unwrap();
        repo.create(&student("C", g1.id, owner.id)).await.unwrap();

        let in_g1 = repo.list(&StudentFilter::in_groups(vec![g1.id])).await.unwrap();
        assert_eq!(in_g1.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["A", "C"]);

        assert!(repo.list(&StudentFilter::in_groups(vec![])).await.unwrap().is_empty());
        assert_eq!(repo.list(&StudentFilter::default()).await.unwrap().len(), 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_many_is_atomic(pool: PgPool) {
        let owner = create_test_user(&pool, Role::User).await;
        let group = create_test_group(&pool, owner.id, "Batch").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Students::new(&mut conn);

        let created = repo
            .create_many(&[student("A", group.id, owner.id), student("B", group.id, owner.id)])
            .await
            .unwrap();
        assert_eq!(created.len(), 2);

        // Second row references a missing group, so the first must roll back too
        let result = repo
            .create_many(&[student("C", group.id, owner.id), student("D", Uuid::new_v4(), owner.id)])
            .await;
        assert!(matches!(result, Err(DbError::ForeignKeyViolation { .. })));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students").fetch_one(&pool).await.unwrap();
        assert_eq!(count, 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_and_delete(pool: PgPool) {
        let owner = create_test_user(&pool, Role::User).await;
        let group = create_test_group(&pool, owner.id, "Edits").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Students::new(&mut conn);

        let created = repo.create(&student("Old", group.id, owner.id)).await.unwrap();
        repo.append_call(created.id, CallStatus::Called).await.unwrap();

        let updated = repo
            .update(
                created.id,
                &StudentUpdateDBRequest {
                    phone: Some("555-9999".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Old");
        assert_eq!(updated.phone, "555-9999");
        assert_eq!(updated.call_history.len(), 1);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
        assert!(matches!(
            repo.update(created.id, &StudentUpdateDBRequest::default()).await,
            Err(DbError::NotFound)
        ));
    }
}
