//! Group repository implementation
//!
//! Capacity checks, roster changes and join-request decisions run inside a
//! transaction holding the group row lock, so concurrent joins can never
//! overshoot `max_participants`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ApproveOutcome, GroupRepository, JoinRequestOutcome, RosterChange};
use crate::models::{
    CreateGroupRequest, Group, GroupParticipant, JoinRequest, JoinRequestStatus,
};
use crate::utils::errors::{MentorLinkError, Result};

const GROUP_COLUMNS: &str =
    "id, owner_id, name, kind, max_participants, price_cents, created_at, updated_at";

const JOIN_REQUEST_COLUMNS: &str =
    "id, group_id, user_id, user_name, status, requested_at, decided_at";

#[derive(Clone)]
pub struct PgGroupRepository {
    pool: PgPool,
}

impl PgGroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupRepository for PgGroupRepository {
    async fn create(&self, owner_id: &str, request: CreateGroupRequest) -> Result<Group> {
        let mut tx = self.pool.begin().await?;

        let group = sqlx::query_as::<_, Group>(&format!(
            r#"
            INSERT INTO groups (id, owner_id, name, kind, max_participants, price_cents, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {GROUP_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&request.name)
        .bind(request.kind)
        .bind(request.max_participants)
        .bind(request.price_cents)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO group_participants (group_id, user_id, joined_at) VALUES ($1, $2, $3)")
            .bind(group.id)
            .bind(owner_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(group)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(group)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        // roster and join requests are removed by ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_participant(&self, group_id: Uuid, user_id: &str) -> Result<RosterChange> {
        let mut tx = self.pool.begin().await?;

        let max_participants: Option<(i32,)> =
            sqlx::query_as("SELECT max_participants FROM groups WHERE id = $1 FOR UPDATE")
                .bind(group_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((max_participants,)) = max_participants else {
            return Err(MentorLinkError::GroupNotFound { group_id });
        };

        let already: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM group_participants WHERE group_id = $1 AND user_id = $2)",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        if already.0 {
            return Ok(RosterChange::AlreadyMember);
        }

        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM group_participants WHERE group_id = $1")
                .bind(group_id)
                .fetch_one(&mut *tx)
                .await?;
        if count.0 >= max_participants as i64 {
            return Ok(RosterChange::Full);
        }

        sqlx::query("INSERT INTO group_participants (group_id, user_id, joined_at) VALUES ($1, $2, $3)")
            .bind(group_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(RosterChange::Added)
    }

    async fn remove_participant(&self, group_id: Uuid, user_id: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM group_participants WHERE group_id = $1 AND user_id = $2")
                .bind(group_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn participants(&self, group_id: Uuid) -> Result<Vec<GroupParticipant>> {
        let participants = sqlx::query_as::<_, GroupParticipant>(
            "SELECT group_id, user_id, joined_at FROM group_participants WHERE group_id = $1 ORDER BY joined_at ASC",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(participants)
    }

    async fn participant_count(&self, group_id: Uuid) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM group_participants WHERE group_id = $1")
                .bind(group_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count.0)
    }

    async fn is_participant(&self, group_id: Uuid, user_id: &str) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM group_participants WHERE group_id = $1 AND user_id = $2)",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>(
            r#"
            SELECT g.id, g.owner_id, g.name, g.kind, g.max_participants, g.price_cents, g.created_at, g.updated_at
            FROM groups g
            INNER JOIN group_participants gp ON g.id = gp.group_id
            WHERE gp.user_id = $1
            ORDER BY gp.joined_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(groups)
    }

    async fn list_owned(&self, owner_id: &str) -> Result<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(groups)
    }

    async fn create_join_request(
        &self,
        group_id: Uuid,
        user_id: &str,
        user_name: &str,
    ) -> Result<JoinRequestOutcome> {
        // the partial unique index on (group_id, user_id) WHERE status = 'pending'
        // makes the single-pending-request rule atomic
        let request = sqlx::query_as::<_, JoinRequest>(&format!(
            r#"
            INSERT INTO join_requests (id, group_id, user_id, user_name, status, requested_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (group_id, user_id) WHERE status = 'pending' DO NOTHING
            RETURNING {JOIN_REQUEST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(group_id)
        .bind(user_id)
        .bind(user_name)
        .bind(JoinRequestStatus::Pending)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match request {
            Some(request) => JoinRequestOutcome::Created(request),
            None => JoinRequestOutcome::DuplicatePending,
        })
    }

    async fn pending_requests(&self, group_id: Uuid) -> Result<Vec<JoinRequest>> {
        let requests = sqlx::query_as::<_, JoinRequest>(&format!(
            "SELECT {JOIN_REQUEST_COLUMNS} FROM join_requests WHERE group_id = $1 AND status = $2 ORDER BY requested_at ASC"
        ))
        .bind(group_id)
        .bind(JoinRequestStatus::Pending)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn approve_request(&self, group_id: Uuid, user_id: &str) -> Result<ApproveOutcome> {
        let mut tx = self.pool.begin().await?;

        let max_participants: Option<(i32,)> =
            sqlx::query_as("SELECT max_participants FROM groups WHERE id = $1 FOR UPDATE")
                .bind(group_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((max_participants,)) = max_participants else {
            return Err(MentorLinkError::GroupNotFound { group_id });
        };

        let pending: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM join_requests WHERE group_id = $1 AND user_id = $2 AND status = $3 FOR UPDATE",
        )
        .bind(group_id)
        .bind(user_id)
        .bind(JoinRequestStatus::Pending)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((request_id,)) = pending else {
            return Ok(ApproveOutcome::NoPendingRequest);
        };

        // capacity is re-checked at approval time, not reserved at request time
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM group_participants WHERE group_id = $1")
                .bind(group_id)
                .fetch_one(&mut *tx)
                .await?;
        if count.0 >= max_participants as i64 {
            return Ok(ApproveOutcome::Full);
        }

        let request = sqlx::query_as::<_, JoinRequest>(&format!(
            r#"
            UPDATE join_requests
            SET status = $2, decided_at = $3
            WHERE id = $1
            RETURNING {JOIN_REQUEST_COLUMNS}
            "#
        ))
        .bind(request_id)
        .bind(JoinRequestStatus::Approved)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO group_participants (group_id, user_id, joined_at) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(group_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ApproveOutcome::Approved(request))
    }

    async fn reject_request(&self, group_id: Uuid, user_id: &str) -> Result<Option<JoinRequest>> {
        let request = sqlx::query_as::<_, JoinRequest>(&format!(
            r#"
            UPDATE join_requests
            SET status = $4, decided_at = $5
            WHERE group_id = $1 AND user_id = $2 AND status = $3
            RETURNING {JOIN_REQUEST_COLUMNS}
            "#
        ))
        .bind(group_id)
        .bind(user_id)
        .bind(JoinRequestStatus::Pending)
        .bind(JoinRequestStatus::Rejected)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }
}
