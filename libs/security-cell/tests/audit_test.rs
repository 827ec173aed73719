use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use security_cell::models::{AuditEntry, AuditEventType, AuditOutcome};
use security_cell::router::security_routes;
use security_cell::services::audit::AuditService;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn create_test_app(config: AppConfig, audit: Arc<AuditService>) -> Router {
    security_routes(Arc::new(config), audit)
}

async fn send_json(
    app: Router,
    method_str: &str,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method_str)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(match body {
            Some(b) => Body::from(b.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(json!(null));
    (status, json)
}

#[tokio::test]
async fn events_are_buffered_until_an_explicit_flush() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("pat@example.com");
    let patient_token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));
    let admin = TestUser::admin("admin@example.com");
    let admin_token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(1));

    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_logs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app_config = config.to_app_config();
    let audit = Arc::new(AuditService::new(&app_config));
    let app = create_test_app(app_config, audit.clone());

    let (recorded, _) = send_json(
        app.clone(),
        "POST",
        "/events",
        &patient_token,
        Some(json!({
            "event_type": "patient_data_viewed",
            "action": "Viewed lab report",
            "outcome": "success",
            "patient_id": patient.id,
            "risk_score": 10,
            "context": { "report": "bloods.pdf" }
        })),
    )
    .await;
    assert_eq!(recorded, StatusCode::OK);
    assert_eq!(audit.buffered_count().await, 1);

    let (flushed, body) = send_json(app, "POST", "/audit/flush", &admin_token, None).await;
    assert_eq!(flushed, StatusCode::OK);
    assert_eq!(body["flushed"], 1);
    assert_eq!(audit.buffered_count().await, 0);
}

#[tokio::test]
async fn hitting_the_threshold_flushes_a_full_batch() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_logs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app_config = config.to_app_config();
    let audit = AuditService::new(&app_config);

    for i in 0..100 {
        let entry = AuditEntry::new(
            AuditEventType::LoginSuccess,
            format!("login {}", i),
            AuditOutcome::Success,
        );
        audit.record(entry).await.unwrap();
    }

    assert_eq!(audit.buffered_count().await, 0);
}

#[tokio::test]
async fn flushing_an_empty_buffer_writes_nothing() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_logs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app_config = config.to_app_config();
    let audit = AuditService::new(&app_config);
    audit.flush().await.unwrap();
}

#[tokio::test]
async fn audit_read_endpoint_is_admin_only() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let doctor_token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));
    let admin = TestUser::admin("admin@example.com");
    let admin_token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/audit_logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "event_id": "e1", "action": "login", "outcome": "success" }
        ])))
        .mount(&mock_server)
        .await;

    let app_config = config.to_app_config();
    let audit = Arc::new(AuditService::new(&app_config));
    let app = create_test_app(app_config, audit);

    let (denied, _) = send_json(
        app.clone(),
        "GET",
        "/audit/some-user-id",
        &doctor_token,
        None,
    )
    .await;
    let (allowed, body) = send_json(app, "GET", "/audit/some-user-id", &admin_token, None).await;

    assert_eq!(denied, StatusCode::UNAUTHORIZED);
    assert_eq!(allowed, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn failed_ip_lookup_does_not_block_recording() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::with_supabase_url(&mock_server.uri());
    // Point the lookup at the mock server with no matching route.
    config.supabase_url = mock_server.uri();
    let patient = TestUser::patient("pat@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));

    let mut app_config = config.to_app_config();
    app_config.ip_lookup_url = format!("{}/ip-missing", mock_server.uri());

    let audit = Arc::new(AuditService::new(&app_config));
    let app = create_test_app(app_config, audit.clone());

    let (status, _) = send_json(
        app,
        "POST",
        "/events",
        &token,
        Some(json!({
            "event_type": "login_failure",
            "action": "Failed login",
            "outcome": "failure",
            "patient_id": null,
            "risk_score": 50,
            "context": null
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit.buffered_count().await, 1);
}

#[tokio::test]
async fn flushed_batch_carries_the_recorded_fields() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_logs"))
        .and(body_partial_json(json!([
            { "action": "Booked appointment", "event_type": "appointment_booked" }
        ])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app_config = config.to_app_config();
    let audit = AuditService::new(&app_config);

    let entry = AuditEntry::new(
        AuditEventType::AppointmentBooked,
        "Booked appointment".to_string(),
        AuditOutcome::Success,
    )
    .with_user("user-1".to_string())
    .add_context("slot", "09:00");

    audit.record(entry).await.unwrap();
    audit.flush().await.unwrap();
}
