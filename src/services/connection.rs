//! Connection service implementation
//!
//! This service owns the mentoring connection lifecycle: request, accept or
//! reject by the mentor, activation on payment completion, and the session
//! counter of active engagements. Transitions are conditional updates in the
//! store, so conflicting transitions on the same connection cannot both
//! succeed.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::repositories::ConnectionRepository;
use crate::models::{
    Connection, ConnectionRole, ConnectionStatus, CreateConnectionRequest, MentorKind,
};
use crate::services::notification::NotificationService;
use crate::services::payment::PaymentService;
use crate::utils::errors::{MentorLinkError, Result};

/// Connection service for managing the mentoring lifecycle
#[derive(Clone)]
pub struct ConnectionService {
    connections: Arc<dyn ConnectionRepository>,
    notifications: NotificationService,
    payments: PaymentService,
}

impl ConnectionService {
    /// Create a new ConnectionService instance
    pub fn new(
        connections: Arc<dyn ConnectionRepository>,
        notifications: NotificationService,
        payments: PaymentService,
    ) -> Self {
        Self {
            connections,
            notifications,
            payments,
        }
    }

    /// Entrepreneur requests a connection to a mentor
    pub async fn request_connection(
        &self,
        entrepreneur_id: &str,
        mentor_id: &str,
        mentor_kind: MentorKind,
        message: Option<String>,
    ) -> Result<Connection> {
        debug!(entrepreneur_id = %entrepreneur_id, mentor_id = %mentor_id, "Requesting connection");

        if entrepreneur_id == mentor_id {
            return Err(MentorLinkError::InvalidInput(
                "cannot request a connection to yourself".to_string(),
            ));
        }

        let message = message.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());
        if mentor_kind == MentorKind::Personal && message.is_none() {
            return Err(MentorLinkError::InvalidInput(
                "personal mentoring requests require a message".to_string(),
            ));
        }

        let connection = self
            .connections
            .create(CreateConnectionRequest {
                entrepreneur_id: entrepreneur_id.to_string(),
                mentor_id: mentor_id.to_string(),
                mentor_kind,
                request_message: message,
            })
            .await?;

        info!(connection_id = %connection.id, entrepreneur_id = %entrepreneur_id,
              mentor_id = %mentor_id, "Connection requested");

        self.notifications.connection_requested(&connection).await;
        if mentor_kind == MentorKind::Personal {
            self.notifications.payment_required(&connection).await;
        }

        Ok(connection)
    }

    /// Mentor accepts a pending connection request
    pub async fn accept(&self, connection_id: Uuid, actor_id: &str) -> Result<Connection> {
        let connection = self.require(connection_id).await?;

        if connection.mentor_id != actor_id {
            warn!(connection_id = %connection_id, actor_id = %actor_id, "Accept denied: not the mentor");
            return Err(MentorLinkError::PermissionDenied(
                "only the mentor may accept a connection request".to_string(),
            ));
        }

        let accepted = self
            .connections
            .transition(connection_id, ConnectionStatus::Pending, ConnectionStatus::Accepted)
            .await?
            .ok_or_else(|| MentorLinkError::InvalidTransition {
                from: connection.status.as_str().to_string(),
                to: ConnectionStatus::Accepted.as_str().to_string(),
            })?;

        info!(connection_id = %connection_id, "Connection accepted");
        self.notifications.connection_accepted(&accepted).await;

        Ok(accepted)
    }

    /// Mentor rejects a pending connection request
    pub async fn reject(&self, connection_id: Uuid, actor_id: &str) -> Result<Connection> {
        let connection = self.require(connection_id).await?;

        if connection.mentor_id != actor_id {
            warn!(connection_id = %connection_id, actor_id = %actor_id, "Reject denied: not the mentor");
            return Err(MentorLinkError::PermissionDenied(
                "only the mentor may reject a connection request".to_string(),
            ));
        }

        let rejected = self
            .connections
            .transition(connection_id, ConnectionStatus::Pending, ConnectionStatus::Rejected)
            .await?
            .ok_or_else(|| MentorLinkError::InvalidTransition {
                from: connection.status.as_str().to_string(),
                to: ConnectionStatus::Rejected.as_str().to_string(),
            })?;

        info!(connection_id = %connection_id, "Connection rejected");
        self.notifications.connection_rejected(&rejected).await;

        Ok(rejected)
    }

    /// Activate an accepted connection once its payment completed
    pub async fn complete_payment(
        &self,
        connection_id: Uuid,
        payment_ref: &str,
    ) -> Result<Connection> {
        let connection = self.require(connection_id).await?;

        if !self.payments.verify(payment_ref).await? {
            return Err(MentorLinkError::PaymentRejected(payment_ref.to_string()));
        }

        let activated = self
            .connections
            .complete_payment(connection_id, payment_ref)
            .await?
            .ok_or_else(|| MentorLinkError::InvalidTransition {
                from: connection.status.as_str().to_string(),
                to: ConnectionStatus::Active.as_str().to_string(),
            })?;

        info!(connection_id = %connection_id, payment_ref = %payment_ref, "Connection activated");
        self.notifications.connection_activated(&activated).await;

        Ok(activated)
    }

    /// Count one completed mentoring session on an active connection
    pub async fn record_session(&self, connection_id: Uuid) -> Result<Connection> {
        let connection = self.require(connection_id).await?;

        self.connections
            .increment_session_count(connection_id)
            .await?
            .ok_or_else(|| MentorLinkError::InvalidTransition {
                from: connection.status.as_str().to_string(),
                to: connection.status.as_str().to_string(),
            })
    }

    /// Get one connection
    pub async fn get(&self, connection_id: Uuid) -> Result<Option<Connection>> {
        self.connections.find_by_id(connection_id).await
    }

    /// List connections where the user plays the given role
    pub async fn list_for_user(
        &self,
        user_id: &str,
        role: ConnectionRole,
    ) -> Result<Vec<Connection>> {
        self.connections.list_for_user(user_id, role).await
    }

    async fn require(&self, connection_id: Uuid) -> Result<Connection> {
        self.connections
            .find_by_id(connection_id)
            .await?
            .ok_or(MentorLinkError::ConnectionNotFound { connection_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::database::Storage;
    use assert_matches::assert_matches;

    fn service(storage: &Storage) -> ConnectionService {
        let notifications = NotificationService::new(storage.notifications.clone());
        let payments = PaymentService::new(Settings::default()).unwrap();
        ConnectionService::new(storage.connections.clone(), notifications, payments)
    }

    #[tokio::test]
    async fn test_personal_request_requires_message() {
        let storage = Storage::in_memory();
        let service = service(&storage);

        let result = service
            .request_connection("e1", "m1", MentorKind::Personal, None)
            .await;
        assert_matches!(result, Err(MentorLinkError::InvalidInput(_)));

        let result = service
            .request_connection("e1", "m1", MentorKind::Personal, Some("   ".to_string()))
            .await;
        assert_matches!(result, Err(MentorLinkError::InvalidInput(_)));

        // group mentoring requests may omit the message
        let connection = service
            .request_connection("e1", "m1", MentorKind::Group, None)
            .await
            .unwrap();
        assert_eq!(connection.status, ConnectionStatus::Pending);
    }

    #[tokio::test]
    async fn test_only_mentor_accepts() {
        let storage = Storage::in_memory();
        let service = service(&storage);

        let connection = service
            .request_connection("e1", "m1", MentorKind::Personal, Some("Need help".to_string()))
            .await
            .unwrap();

        let result = service.accept(connection.id, "e1").await;
        assert_matches!(result, Err(MentorLinkError::PermissionDenied(_)));

        let accepted = service.accept(connection.id, "m1").await.unwrap();
        assert_eq!(accepted.status, ConnectionStatus::Accepted);

        // accepting twice is an invalid transition
        let result = service.accept(connection.id, "m1").await;
        assert_matches!(result, Err(MentorLinkError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_payment_before_accept_fails() {
        let storage = Storage::in_memory();
        let service = service(&storage);

        let connection = service
            .request_connection("e1", "m1", MentorKind::Personal, Some("Need help".to_string()))
            .await
            .unwrap();

        let result = service.complete_payment(connection.id, "PAY123").await;
        assert_matches!(result, Err(MentorLinkError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_session_count_requires_active() {
        let storage = Storage::in_memory();
        let service = service(&storage);

        let connection = service
            .request_connection("e1", "m1", MentorKind::Personal, Some("Need help".to_string()))
            .await
            .unwrap();
        assert_matches!(
            service.record_session(connection.id).await,
            Err(MentorLinkError::InvalidTransition { .. })
        );

        service.accept(connection.id, "m1").await.unwrap();
        service.complete_payment(connection.id, "PAY123").await.unwrap();

        let counted = service.record_session(connection.id).await.unwrap();
        assert_eq!(counted.session_count, 1);
    }

    #[tokio::test]
    async fn test_self_connection_rejected() {
        let storage = Storage::in_memory();
        let service = service(&storage);

        let result = service
            .request_connection("u1", "u1", MentorKind::Group, None)
            .await;
        assert_matches!(result, Err(MentorLinkError::InvalidInput(_)));
    }
}
