use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use schedule_cell::router::schedule_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn create_test_app(config: AppConfig) -> Router {
    schedule_routes(Arc::new(config))
}

fn schedule_row(doctor_id: &str, date: &str, is_available: bool) -> Value {
    json!({
        "id": Uuid::new_v4().to_string(),
        "doctor_id": doctor_id,
        "schedule_date": date,
        "day_of_week": 1,
        "is_available": is_available,
        "start_time": "09:00:00",
        "end_time": "12:00:00",
        "break_start": null,
        "break_end": null,
        "slot_duration_minutes": 30,
        "status": if is_available { "active" } else { "inactive" },
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    })
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
    let json: Value = if bytes.is_empty() {
        json!(null)
    } else {
        serde_json::from_slice(&bytes).unwrap_or(json!(null))
    };
    (status, json)
}

#[tokio::test]
async fn generate_fails_with_conflict_when_window_already_exists() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    // Guard query finds an existing schedule row inside the window.
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            schedule_row(&doctor.id, "2026-08-26", true)
        ])))
        .mount(&mock_server)
        .await;

    // No inserts may happen once the guard trips.
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send_json(
        app,
        "POST",
        &format!("/{}/generate", doctor.id),
        &token,
        Some(json!({
            "start_time": "09:00:00",
            "end_time": "17:00:00",
            "break_start": "13:00:00",
            "break_end": "13:30:00",
            "slot_duration_minutes": 30,
            "working_days": [1, 2, 3, 4, 5]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already has schedules"));
}

#[tokio::test]
async fn generate_creates_a_full_window_of_days() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    // Empty guard query: the window is free.
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    // One insert per day of the window.
    let today = Utc::now().date_naive();
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            schedule_row(&doctor.id, &today.to_string(), true)
        ])))
        .expect(28)
        .mount(&mock_server)
        .await;

    // Every day is a working day, so every day gets a slot batch.
    Mock::given(method("POST"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(28)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send_json(
        app,
        "POST",
        &format!("/{}/generate", doctor.id),
        &token,
        Some(json!({
            "start_time": "09:00:00",
            "end_time": "12:00:00",
            "break_start": null,
            "break_end": null,
            "slot_duration_minutes": 30,
            "working_days": [0, 1, 2, 3, 4, 5, 6]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days_created"], 28);
    // 09:00-12:00 at 30 minutes is 6 slots per day.
    assert_eq!(body["slots_created"], 28 * 6);
}

#[tokio::test]
async fn modify_day_rebuilds_that_days_slots() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    let date = Utc::now().date_naive() + Duration::days(3);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .and(query_param("schedule_date", format!("eq.{}", date)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            schedule_row(&doctor.id, &date.to_string(), true)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            schedule_row(&doctor.id, &date.to_string(), true)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The old slots for the date are dropped, then regenerated.
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("slot_date", format!("eq.{}", date)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send_json(
        app,
        "PUT",
        &format!("/{}/days/{}", doctor.id, date),
        &token,
        Some(json!({
            "start_time": "10:00:00",
            "end_time": "14:00:00"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schedule"]["doctor_id"], doctor.id);
}

#[tokio::test]
async fn marking_a_day_unavailable_leaves_no_slots_behind() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    let date = Utc::now().date_naive() + Duration::days(5);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            schedule_row(&doctor.id, &date.to_string(), true)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            schedule_row(&doctor.id, &date.to_string(), false)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // An unavailable day must not get fresh slots.
    Mock::given(method("POST"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, _) = send_json(
        app,
        "PUT",
        &format!("/{}/days/{}", doctor.id, date),
        &token,
        Some(json!({ "is_available": false })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn modify_unknown_day_returns_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let date = Utc::now().date_naive() + Duration::days(2);
    let (status, _) = send_json(
        app,
        "PUT",
        &format!("/{}/days/{}", doctor.id, date),
        &token,
        Some(json!({ "is_available": false })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clear_deletes_slots_and_schedules_in_the_window() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    let window_start = Utc::now().date_naive();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("slot_date", format!("gte.{}", window_start)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctor_schedules"))
        .and(query_param("schedule_date", format!("gte.{}", window_start)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send_json(app, "DELETE", &format!("/{}", doctor.id), &token, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["window_start"], window_start.to_string());
}

#[tokio::test]
async fn patients_cannot_generate_schedules() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("pat@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));

    let app = create_test_app(config.to_app_config());
    let (status, _) = send_json(
        app,
        "POST",
        &format!("/{}/generate", Uuid::new_v4()),
        &token,
        Some(json!({
            "start_time": "09:00:00",
            "end_time": "17:00:00",
            "break_start": null,
            "break_end": null,
            "slot_duration_minutes": 30,
            "working_days": [1]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn doctors_cannot_touch_another_doctors_window() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    let app = create_test_app(config.to_app_config());
    let (status, _) = send_json(
        app,
        "DELETE",
        &format!("/{}", Uuid::new_v4()),
        &token,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_time_window_is_rejected_before_any_write() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, _) = send_json(
        app,
        "POST",
        &format!("/{}/generate", doctor.id),
        &token,
        Some(json!({
            "start_time": "17:00:00",
            "end_time": "09:00:00",
            "break_start": null,
            "break_end": null,
            "slot_duration_minutes": 30,
            "working_days": [1]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn public_slot_listing_requires_no_token() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor_id = Uuid::new_v4();
    let date = Utc::now().date_naive();

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .and(query_param("slot_date", format!("eq.{}", date)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": Uuid::new_v4().to_string(),
                "doctor_id": doctor_id.to_string(),
                "slot_date": date.to_string(),
                "start_time": "09:00:00",
                "end_time": "09:30:00",
                "duration_minutes": 30,
                "status": "available",
                "appointment_id": null,
                "notes": null,
                "created_at": "2026-01-01T00:00:00Z",
                "updated_at": "2026-01-01T00:00:00Z"
            }
        ])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}/slots/{}", doctor_id, date))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["slots"][0]["status"], "available");
}
