//! Payment verification integration tests

mod helpers;

use assert_matches::assert_matches;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mentorlink::config::Settings;
use mentorlink::models::{ConnectionStatus, PaymentStatus};
use mentorlink::services::PaymentService;
use mentorlink::MentorLinkError;

use helpers::{personal_connection, TestContext};

fn settings_for(server: &MockServer) -> Settings {
    let mut settings = Settings::default();
    settings.payment.verify_url = Some(format!("{}/verify", server.uri()));
    settings
}

#[tokio::test]
async fn test_verify_completed_reference() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/verify"))
        .and(query_param("ref", "PAY123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "completed": true,
            "reference": "PAY123",
        })))
        .mount(&server)
        .await;

    let service = PaymentService::new(settings_for(&server)).unwrap();
    assert!(service.is_enabled());
    assert!(service.verify("PAY123").await.unwrap());
}

#[tokio::test]
async fn test_verify_incomplete_reference() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "completed": false,
            "reference": "PAY999",
        })))
        .mount(&server)
        .await;

    let service = PaymentService::new(settings_for(&server)).unwrap();
    assert!(!service.verify("PAY999").await.unwrap());
}

#[tokio::test]
async fn test_processor_error_is_recoverable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = PaymentService::new(settings_for(&server)).unwrap();
    let error = service.verify("PAY123").await.unwrap_err();
    assert_matches!(error, MentorLinkError::Http(_));
    assert!(error.is_recoverable());
}

#[tokio::test]
async fn test_activation_refused_for_unverified_payment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/verify"))
        .and(query_param("ref", "GOOD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "completed": true,
            "reference": "GOOD",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/verify"))
        .and(query_param("ref", "BAD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "completed": false,
            "reference": "BAD",
        })))
        .mount(&server)
        .await;

    let ctx = TestContext::with_settings(settings_for(&server));
    let connections = &ctx.services.connection_service;

    let connection = personal_connection(&ctx, "E1", "M1").await;
    connections.accept(connection.id, "M1").await.unwrap();

    // an unverified reference leaves the connection accepted and unpaid
    let result = connections.complete_payment(connection.id, "BAD").await;
    assert_matches!(result, Err(MentorLinkError::PaymentRejected(_)));
    let current = connections.get(connection.id).await.unwrap().unwrap();
    assert_eq!(current.status, ConnectionStatus::Accepted);
    assert_eq!(current.payment_status, PaymentStatus::Pending);

    // the verified reference activates it
    let active = connections.complete_payment(connection.id, "GOOD").await.unwrap();
    assert_eq!(active.status, ConnectionStatus::Active);
    assert_eq!(active.payment_status, PaymentStatus::Completed);
}
