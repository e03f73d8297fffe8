//! Shared test fixtures
//!
//! Builds the service stack over the in-memory backend so integration tests
//! run deterministically without external services.

#![allow(dead_code)]

use fake::faker::name::en::Name;
use fake::Fake;

use mentorlink::config::Settings;
use mentorlink::database::Storage;
use mentorlink::models::{
    Connection, CreateGroupRequest, Group, GroupKind, MentorKind,
};
use mentorlink::services::ServiceFactory;

pub struct TestContext {
    pub storage: Storage,
    pub services: ServiceFactory,
    pub settings: Settings,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let storage = Storage::in_memory();
        let services = ServiceFactory::new(storage.clone(), settings.clone(), None)
            .expect("service factory");
        Self {
            storage,
            services,
            settings,
        }
    }
}

/// A random display name
pub fn display_name() -> String {
    Name().fake()
}

pub fn group_request(kind: GroupKind, max_participants: i32) -> CreateGroupRequest {
    CreateGroupRequest {
        name: "Founders circle".to_string(),
        kind,
        max_participants,
        price_cents: if kind == GroupKind::Paid {
            Some(4900)
        } else {
            None
        },
    }
}

pub async fn free_group(ctx: &TestContext, owner_id: &str, max_participants: i32) -> Group {
    ctx.services
        .membership_service
        .create_group(owner_id, group_request(GroupKind::Free, max_participants))
        .await
        .expect("create free group")
}

pub async fn self_help_group(ctx: &TestContext, owner_id: &str, max_participants: i32) -> Group {
    ctx.services
        .membership_service
        .create_group(owner_id, group_request(GroupKind::SelfHelp, max_participants))
        .await
        .expect("create self-help group")
}

pub async fn personal_connection(
    ctx: &TestContext,
    entrepreneur_id: &str,
    mentor_id: &str,
) -> Connection {
    ctx.services
        .connection_service
        .request_connection(
            entrepreneur_id,
            mentor_id,
            MentorKind::Personal,
            Some("Need help".to_string()),
        )
        .await
        .expect("request connection")
}
