//! Notification service implementation
//!
//! Records a notification for every terminal state transition so users can
//! retrieve them later. Delivery is at-least-once: a transition that is
//! retried may record the notification twice, and no deduplication is
//! attempted.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::repositories::NotificationRepository;
use crate::models::{Connection, CreateNotificationRequest, Group, JoinRequest, Notification};
use crate::utils::errors::Result;

/// Notification service for recording and retrieving notifications
#[derive(Clone)]
pub struct NotificationService {
    notifications: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    /// Create a new NotificationService instance
    pub fn new(notifications: Arc<dyn NotificationRepository>) -> Self {
        Self { notifications }
    }

    /// Record a notification, logging instead of failing the caller's
    /// transition when the write does not go through
    async fn record(&self, request: CreateNotificationRequest) {
        let user_id = request.user_id.clone();
        match self.notifications.create(request).await {
            Ok(notification) => {
                debug!(user_id = %user_id, notification_id = %notification.id, "Notification recorded");
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to record notification");
            }
        }
    }

    pub async fn connection_requested(&self, connection: &Connection) {
        self.record(CreateNotificationRequest {
            user_id: connection.mentor_id.clone(),
            title: "New mentoring request".to_string(),
            body: match &connection.request_message {
                Some(message) => format!("You have a new mentoring request: \"{}\"", message),
                None => "You have a new mentoring request".to_string(),
            },
            link: Some(format!("/connections/{}", connection.id)),
        })
        .await;
    }

    pub async fn connection_accepted(&self, connection: &Connection) {
        self.record(CreateNotificationRequest {
            user_id: connection.entrepreneur_id.clone(),
            title: "Mentoring request accepted".to_string(),
            body: "Your mentor accepted the request".to_string(),
            link: Some(format!("/connections/{}", connection.id)),
        })
        .await;
    }

    pub async fn connection_rejected(&self, connection: &Connection) {
        self.record(CreateNotificationRequest {
            user_id: connection.entrepreneur_id.clone(),
            title: "Mentoring request declined".to_string(),
            body: "Your mentoring request was declined".to_string(),
            link: Some(format!("/connections/{}", connection.id)),
        })
        .await;
    }

    pub async fn payment_required(&self, connection: &Connection) {
        self.record(CreateNotificationRequest {
            user_id: connection.entrepreneur_id.clone(),
            title: "Payment required".to_string(),
            body: "Complete the payment to activate your mentoring sessions".to_string(),
            link: Some(format!("/connections/{}/payment", connection.id)),
        })
        .await;
    }

    pub async fn connection_activated(&self, connection: &Connection) {
        for user_id in [&connection.entrepreneur_id, &connection.mentor_id] {
            self.record(CreateNotificationRequest {
                user_id: user_id.clone(),
                title: "Mentoring activated".to_string(),
                body: "Payment completed, the mentoring connection is now active".to_string(),
                link: Some(format!("/connections/{}", connection.id)),
            })
            .await;
        }
    }

    pub async fn join_requested(&self, group: &Group, request: &JoinRequest) {
        self.record(CreateNotificationRequest {
            user_id: group.owner_id.clone(),
            title: "New join request".to_string(),
            body: format!("{} asked to join \"{}\"", request.user_name, group.name),
            link: Some(format!("/groups/{}/requests", group.id)),
        })
        .await;
    }

    pub async fn join_approved(&self, group: &Group, user_id: &str) {
        self.record(CreateNotificationRequest {
            user_id: user_id.to_string(),
            title: "Join request approved".to_string(),
            body: format!("You are now a member of \"{}\"", group.name),
            link: Some(format!("/groups/{}", group.id)),
        })
        .await;
    }

    pub async fn join_rejected(&self, group: &Group, user_id: &str) {
        self.record(CreateNotificationRequest {
            user_id: user_id.to_string(),
            title: "Join request declined".to_string(),
            body: format!("Your request to join \"{}\" was declined", group.name),
            link: Some(format!("/groups/{}", group.id)),
        })
        .await;
    }

    /// List notifications for a user, newest first
    pub async fn list_for_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        self.notifications.list_for_user(user_id, unread_only).await
    }

    /// Mark one notification as read
    pub async fn mark_read(&self, notification_id: Uuid) -> Result<Notification> {
        self.notifications.mark_read(notification_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::ConnectionRepository;
    use crate::database::Storage;
    use crate::models::{CreateConnectionRequest, MentorKind};

    #[tokio::test]
    async fn test_connection_request_notifies_mentor() {
        let storage = Storage::in_memory();
        let service = NotificationService::new(storage.notifications.clone());

        let connection = storage
            .connections
            .create(CreateConnectionRequest {
                entrepreneur_id: "e1".to_string(),
                mentor_id: "m1".to_string(),
                mentor_kind: MentorKind::Personal,
                request_message: Some("Need help".to_string()),
            })
            .await
            .unwrap();

        service.connection_requested(&connection).await;

        let notifications = service.list_for_user("m1", true).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].body.contains("Need help"));
        assert!(!notifications[0].read);

        // the entrepreneur got nothing
        assert!(service.list_for_user("e1", true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_read() {
        let storage = Storage::in_memory();
        let service = NotificationService::new(storage.notifications.clone());

        let connection = storage
            .connections
            .create(CreateConnectionRequest {
                entrepreneur_id: "e1".to_string(),
                mentor_id: "m1".to_string(),
                mentor_kind: MentorKind::Group,
                request_message: None,
            })
            .await
            .unwrap();

        service.connection_accepted(&connection).await;
        let notifications = service.list_for_user("e1", true).await.unwrap();
        let read = service.mark_read(notifications[0].id).await.unwrap();
        assert!(read.read);
        assert!(service.list_for_user("e1", true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_notifications_are_kept() {
        let storage = Storage::in_memory();
        let service = NotificationService::new(storage.notifications.clone());

        let connection = storage
            .connections
            .create(CreateConnectionRequest {
                entrepreneur_id: "e1".to_string(),
                mentor_id: "m1".to_string(),
                mentor_kind: MentorKind::Personal,
                request_message: Some("hi".to_string()),
            })
            .await
            .unwrap();

        service.connection_requested(&connection).await;
        service.connection_requested(&connection).await;

        // at-least-once delivery: no deduplication
        assert_eq!(service.list_for_user("m1", false).await.unwrap().len(), 2);
    }
}
