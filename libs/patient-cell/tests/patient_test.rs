use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::router::patient_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn create_test_app(config: AppConfig) -> Router {
    patient_routes(Arc::new(config))
}

fn registration_row(id: Uuid, status: &str, document_path: Option<&str>) -> Value {
    json!({
        "id": id.to_string(),
        "first_name": "Alex",
        "last_name": "Byrne",
        "email": "alex@example.com",
        "phone_number": "+353851234567",
        "date_of_birth": "1990-04-12",
        "id_document_path": document_path,
        "status": status,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    })
}

fn patient_row(id: &str) -> Value {
    json!({
        "id": id,
        "first_name": "Alex",
        "last_name": "Byrne",
        "email": "alex@example.com",
        "phone_number": "+353851234567",
        "date_of_birth": "1990-04-12",
        "address": null,
        "allergies": null,
        "current_medications": null,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    })
}

async fn send_json(
    app: Router,
    method_str: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method_str)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(t) = token {
        builder = builder.header("Authorization", format!("Bearer {}", t));
    }
    let request = builder
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
    let json: Value = if bytes.is_empty() {
        json!(null)
    } else {
        serde_json::from_slice(&bytes).unwrap_or(json!(null))
    };
    (status, json)
}

#[tokio::test]
async fn pre_registration_uploads_document_then_inserts_row() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/id-documents/.+\.png$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "ok" })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/patient_pre_registrations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            registration_row(Uuid::new_v4(), "pending", Some("id-documents/abc.png"))
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send_json(
        app,
        "POST",
        "/pre-registrations",
        None,
        Some(json!({
            "first_name": "Alex",
            "last_name": "Byrne",
            "email": "alex@example.com",
            "phone_number": "+353851234567",
            "date_of_birth": "1990-04-12",
            "id_document": format!("data:image/png;base64,{}", BASE64.encode(b"passport-scan"))
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["registration"]["status"], "pending");
    assert!(body["registration"]["id_document_path"].is_string());
}

#[tokio::test]
async fn pre_registration_without_document_skips_storage() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/.*"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/patient_pre_registrations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            registration_row(Uuid::new_v4(), "pending", None)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, _) = send_json(
        app,
        "POST",
        "/pre-registrations",
        None,
        Some(json!({
            "first_name": "Alex",
            "last_name": "Byrne",
            "email": "alex@example.com",
            "phone_number": "+353851234567",
            "date_of_birth": "1990-04-12",
            "id_document": null
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn insert_failure_after_upload_surfaces_the_store_error() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/id-documents/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "ok" })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/patient_pre_registrations"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string("duplicate key value"),
        )
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send_json(
        app,
        "POST",
        "/pre-registrations",
        None,
        Some(json!({
            "first_name": "Alex",
            "last_name": "Byrne",
            "email": "alex@example.com",
            "phone_number": "+353851234567",
            "date_of_birth": "1990-04-12",
            "id_document": BASE64.encode(b"passport-scan")
        })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("duplicate key value"));
}

#[tokio::test]
async fn only_admins_list_pending_registrations() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("pat@example.com");
    let patient_token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));
    let admin = TestUser::admin("admin@example.com");
    let admin_token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_pre_registrations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            registration_row(Uuid::new_v4(), "pending", None)
        ])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());

    let (denied, _) = send_json(
        app.clone(),
        "GET",
        "/pre-registrations/list?status=pending",
        Some(&patient_token),
        None,
    )
    .await;
    let (allowed, body) = send_json(
        app,
        "GET",
        "/pre-registrations/list?status=pending",
        Some(&admin_token),
        None,
    )
    .await;

    assert_eq!(denied, StatusCode::UNAUTHORIZED);
    assert_eq!(allowed, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn admin_approves_a_pre_registration() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(1));

    let registration_id = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patient_pre_registrations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            registration_row(registration_id, "approved", None)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send_json(
        app,
        "PATCH",
        &format!("/pre-registrations/{}/status", registration_id),
        Some(&token),
        Some(json!({ "status": "approved" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["registration"]["status"], "approved");
}

#[tokio::test]
async fn lab_report_upload_stores_file_and_row() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("pat@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));
    let patient_id = patient.id.parse::<Uuid>().unwrap();

    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/lab-reports/.+"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "ok" })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/lab_reports"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {
                "id": Uuid::new_v4().to_string(),
                "patient_id": patient.id,
                "file_name": "bloods.pdf",
                "file_path": format!("lab-reports/{}/bloods.pdf", patient.id),
                "content_type": "application/pdf",
                "uploaded_by": patient.id,
                "created_at": "2026-01-01T00:00:00Z"
            }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send_json(
        app,
        "POST",
        &format!("/{}/reports", patient_id),
        Some(&token),
        Some(json!({
            "file_name": "bloods.pdf",
            "content_type": "application/pdf",
            "file_data": BASE64.encode(b"%PDF-1.4")
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["file_name"], "bloods.pdf");
}

#[tokio::test]
async fn patients_cannot_read_another_patients_record() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("pat@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));

    let app = create_test_app(config.to_app_config());
    let (status, _) = send_json(
        app,
        "GET",
        &format!("/{}", Uuid::new_v4()),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn doctors_can_read_patient_records() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    let patient_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            patient_row(&patient_id.to_string())
        ])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send_json(
        app,
        "GET",
        &format!("/{}", patient_id),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Alex");
}
