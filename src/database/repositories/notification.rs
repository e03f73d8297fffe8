//! Notification repository implementation

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::NotificationRepository;
use crate::models::{CreateNotificationRequest, Notification};
use crate::utils::errors::{MentorLinkError, Result};

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, body, link, read, created_at";

#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn create(&self, request: CreateNotificationRequest) -> Result<Notification> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (id, user_id, title, body, link, read, created_at)
            VALUES ($1, $2, $3, $4, $5, false, $6)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&request.user_id)
        .bind(&request.title)
        .bind(&request.body)
        .bind(&request.link)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn list_for_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        let query = if unread_only {
            format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = $1 AND read = false ORDER BY created_at DESC"
            )
        } else {
            format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC"
            )
        };

        let notifications = sqlx::query_as::<_, Notification>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(notifications)
    }

    async fn mark_read(&self, id: Uuid) -> Result<Notification> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications
            SET read = true
            WHERE id = $1
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        notification.ok_or(MentorLinkError::NotificationNotFound { notification_id: id })
    }
}
