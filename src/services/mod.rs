//! Services module
//!
//! This module contains business logic services

pub mod connection;
pub mod membership;
pub mod message_log;
pub mod notification;
pub mod payment;

// Re-export commonly used services
pub use connection::ConnectionService;
pub use membership::MembershipService;
pub use message_log::MessageLogService;
pub use notification::NotificationService;
pub use payment::{PaymentService, PaymentVerifyResponse};

use std::sync::Arc;

use crate::config::settings::Settings;
use crate::database::Storage;
use crate::session::{ChatSession, SessionStorage};
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub connection_service: Arc<ConnectionService>,
    pub membership_service: Arc<MembershipService>,
    pub message_log: Arc<MessageLogService>,
    pub notification_service: Arc<NotificationService>,
    pub payment_service: Arc<PaymentService>,
    session_storage: Option<Arc<SessionStorage>>,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    pub fn new(
        storage: Storage,
        settings: Settings,
        session_storage: Option<Arc<SessionStorage>>,
    ) -> Result<Self> {
        let notification_service = NotificationService::new(storage.notifications.clone());
        let payment_service = PaymentService::new(settings.clone())?;

        let connection_service = ConnectionService::new(
            storage.connections.clone(),
            notification_service.clone(),
            payment_service.clone(),
        );
        let membership_service = MembershipService::new(
            storage.groups.clone(),
            storage.messages.clone(),
            notification_service.clone(),
            payment_service.clone(),
        );
        let message_log = MessageLogService::new(
            storage.messages.clone(),
            storage.connections.clone(),
            storage.groups.clone(),
            settings.chat.clone(),
        );

        Ok(Self {
            connection_service: Arc::new(connection_service),
            membership_service: Arc::new(membership_service),
            message_log: Arc::new(message_log),
            notification_service: Arc::new(notification_service),
            payment_service: Arc::new(payment_service),
            session_storage,
        })
    }

    /// Create an idle chat session for a user
    pub fn create_session(&self, user_id: &str, user_name: &str) -> ChatSession {
        ChatSession::new(
            user_id,
            user_name,
            self.message_log.clone(),
            self.membership_service.clone(),
            self.session_storage.clone(),
        )
    }
}
