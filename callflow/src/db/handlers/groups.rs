//! Database repository for groups.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::groups::{GroupCreateDBRequest, GroupDBResponse, GroupUpdateDBRequest},
};
use crate::types::{GroupId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing groups
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    /// Restrict to groups created by this user
    pub created_by: Option<UserId>,
}

impl GroupFilter {
    pub fn created_by(user_id: UserId) -> Self {
        Self {
            created_by: Some(user_id),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct Group {
    pub id: GroupId,
    pub name: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Group> for GroupDBResponse {
    fn from(group: Group) -> Self {
        Self {
            id: group.id,
            name: group.name,
            created_by: group.created_by,
            created_at: group.created_at,
            updated_at: group.updated_at,
        }
    }
}

pub struct Groups<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Groups<'c> {
    type CreateRequest = GroupCreateDBRequest;
    type UpdateRequest = GroupUpdateDBRequest;
    type Response = GroupDBResponse;
    type Id = GroupId;
    type Filter = GroupFilter;

    #[instrument(skip(self, request), fields(created_by = %abbrev_uuid(&request.created_by)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let group = sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO groups (id, name, created_by)
            VALUES ($1, $2, $3)
            RETURNING id, name, created_by, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(GroupDBResponse::from(group))
    }

    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let group = sqlx::query_as::<_, Group>("SELECT id, name, created_by, created_at, updated_at FROM groups WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(group.map(GroupDBResponse::from))
    }

    /// Groups in creation order, the order the first-visible-group fallback relies on
    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let groups = sqlx::query_as::<_, Group>(
            r#"
            SELECT id, name, created_by, created_at, updated_at FROM groups
            WHERE ($1::uuid IS NULL OR created_by = $1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(filter.created_by)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(groups.into_iter().map(GroupDBResponse::from).collect())
    }

    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        Ok(self.delete_with_students(id).await?.is_some())
    }

    #[instrument(skip(self, request), fields(group_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let group = sqlx::query_as::<_, Group>(
            r#"
            UPDATE groups SET name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, created_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(GroupDBResponse::from(group))
    }
}

impl<'c> Groups<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Delete a group and every student in it.
    ///
    /// Returns the number of students removed, or `None` if the group did not exist.
    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&id)), err)]
    pub async fn delete_with_students(&mut self, id: GroupId) -> Result<Option<u64>> {
        let mut tx = self.db.begin().await?;

        // Explicit delete so the removed count is known; the FK cascade covers call records
        let students = sqlx::query("DELETE FROM students WHERE group_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(students))
    }
}
