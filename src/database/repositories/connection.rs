//! Connection repository implementation

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::ConnectionRepository;
use crate::models::{
    Connection, ConnectionRole, ConnectionStatus, CreateConnectionRequest, PaymentStatus,
};
use crate::utils::errors::Result;

const CONNECTION_COLUMNS: &str = "id, entrepreneur_id, mentor_id, mentor_kind, status, \
     payment_status, request_message, payment_ref, session_count, created_at, updated_at";

#[derive(Clone)]
pub struct PgConnectionRepository {
    pool: PgPool,
}

impl PgConnectionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectionRepository for PgConnectionRepository {
    async fn create(&self, request: CreateConnectionRequest) -> Result<Connection> {
        let connection = sqlx::query_as::<_, Connection>(&format!(
            r#"
            INSERT INTO connections
                (id, entrepreneur_id, mentor_id, mentor_kind, status, payment_status,
                 request_message, session_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $8)
            RETURNING {CONNECTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&request.entrepreneur_id)
        .bind(&request.mentor_id)
        .bind(request.mentor_kind)
        .bind(ConnectionStatus::Pending)
        .bind(PaymentStatus::Pending)
        .bind(&request.request_message)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(connection)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Connection>> {
        let connection = sqlx::query_as::<_, Connection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(connection)
    }

    async fn transition(
        &self,
        id: Uuid,
        from: ConnectionStatus,
        to: ConnectionStatus,
    ) -> Result<Option<Connection>> {
        let connection = sqlx::query_as::<_, Connection>(&format!(
            r#"
            UPDATE connections
            SET status = $3, updated_at = $4
            WHERE id = $1 AND status = $2
            RETURNING {CONNECTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(connection)
    }

    async fn complete_payment(&self, id: Uuid, payment_ref: &str) -> Result<Option<Connection>> {
        let connection = sqlx::query_as::<_, Connection>(&format!(
            r#"
            UPDATE connections
            SET status = $3, payment_status = $4, payment_ref = $5, updated_at = $6
            WHERE id = $1 AND status = $2
            RETURNING {CONNECTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(ConnectionStatus::Accepted)
        .bind(ConnectionStatus::Active)
        .bind(PaymentStatus::Completed)
        .bind(payment_ref)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(connection)
    }

    async fn increment_session_count(&self, id: Uuid) -> Result<Option<Connection>> {
        let connection = sqlx::query_as::<_, Connection>(&format!(
            r#"
            UPDATE connections
            SET session_count = session_count + 1, updated_at = $3
            WHERE id = $1 AND status = $2
            RETURNING {CONNECTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(ConnectionStatus::Active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(connection)
    }

    async fn list_for_user(&self, user_id: &str, role: ConnectionRole) -> Result<Vec<Connection>> {
        let column = match role {
            ConnectionRole::Entrepreneur => "entrepreneur_id",
            ConnectionRole::Mentor => "mentor_id",
        };

        let connections = sqlx::query_as::<_, Connection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE {column} = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(connections)
    }
}
