use std::sync::Arc;

use agenda_events::SqliteEventStore;
use agenda_scheduler::{EventService, JobTable, Reconciler, SystemClock};
use agenda_users::UserDirectory;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use rusqlite::Connection;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::app::{build_router, AppState};

fn create_test_state() -> Arc<AppState> {
    let store = Arc::new(SqliteEventStore::new(Connection::open_in_memory().unwrap()).unwrap());
    let users = Arc::new(UserDirectory::new(Connection::open_in_memory().unwrap()).unwrap());
    let jobs = Arc::new(JobTable::new());
    let reconciler = Arc::new(Reconciler::new(
        jobs.clone(),
        users.clone(),
        Arc::new(SystemClock),
    ));
    let events = Arc::new(EventService::new(store, reconciler));
    Arc::new(AppState::new(events, users, jobs))
}

async fn call(
    router: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header("x-user-id", user);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Tomorrow, so reminders created in these tests are always in the future.
fn tomorrow() -> String {
    (chrono::Utc::now() + chrono::Duration::days(1))
        .format("%Y-%m-%d")
        .to_string()
}

#[tokio::test]
async fn test_health_endpoint() {
    let router = build_router(create_test_state());
    let (status, body) = call(&router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["pending_jobs"], 0);
}

#[tokio::test]
async fn test_missing_or_bad_identity_is_unauthorized() {
    let router = build_router(create_test_state());

    let (status, body) = call(&router, "GET", "/v1/events", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHORIZED");

    let (status, _) = call(&router, "GET", "/v1/events", Some("alice"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_event_lifecycle_keeps_jobs_in_sync() {
    let router = build_router(create_test_state());
    let (status, _) = call(
        &router,
        "PUT",
        "/v1/me",
        Some("1"),
        Some(json!({ "name": "Ada", "email": "ada@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, created) = call(
        &router,
        "POST",
        "/v1/events",
        Some("1"),
        Some(json!({ "title": "Standup", "date": tomorrow(), "time": "09:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["title"], "Standup");
    assert_eq!(created["time"], "09:00");
    let id = created["id"].as_i64().unwrap();

    let (_, jobs) = call(&router, "GET", "/v1/jobs", Some("1"), None).await;
    assert_eq!(jobs.as_array().unwrap().len(), 1);
    assert_eq!(jobs[0]["event_id"], id);

    // Clearing the time cancels the reminder.
    let (status, updated) = call(
        &router,
        "PUT",
        &format!("/v1/events/{id}"),
        Some("1"),
        Some(json!({ "title": "Standup", "date": tomorrow(), "time": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["time"], Value::Null);
    let (_, jobs) = call(&router, "GET", "/v1/jobs", Some("1"), None).await;
    assert!(jobs.as_array().unwrap().is_empty());

    let (status, body) = call(&router, "DELETE", &format!("/v1/events/{id}"), Some("1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (status, body) = call(&router, "GET", &format!("/v1/events/{id}"), Some("1"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_other_owner_gets_not_found() {
    let router = build_router(create_test_state());
    let (_, created) = call(
        &router,
        "POST",
        "/v1/events",
        Some("1"),
        Some(json!({ "title": "Private" })),
    )
    .await;
    let uri = format!("/v1/events/{}", created["id"]);

    let (status, _) = call(&router, "GET", &uri, Some("2"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&router, "DELETE", &uri, Some("2"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, mine) = call(&router, "GET", "/v1/events", Some("2"), None).await;
    assert!(mine.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_and_invalid_submissions() {
    let router = build_router(create_test_state());
    let draft = json!({ "title": "Dentist", "date": "2020-01-01", "time": "14:00" });

    let (status, _) = call(&router, "POST", "/v1/events", Some("1"), Some(draft.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = call(&router, "POST", "/v1/events", Some("1"), Some(draft)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "DUPLICATE");

    let (status, body) = call(
        &router,
        "POST",
        "/v1/events",
        Some("1"),
        Some(json!({ "title": "Bad", "date": "01/02/2026" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_PARAMS");

    let (status, _) = call(
        &router,
        "POST",
        "/v1/events",
        Some("1"),
        Some(json!({ "title": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reminder_without_contact_is_rejected_and_undone() {
    let router = build_router(create_test_state());
    let (status, body) = call(
        &router,
        "POST",
        "/v1/events",
        Some("5"),
        Some(json!({ "title": "Orphan", "date": tomorrow(), "time": "10:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "RECONCILE_FAILED");

    let (_, events) = call(&router, "GET", "/v1/events", Some("5"), None).await;
    assert!(events.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_contact_validation_and_lookup() {
    let router = build_router(create_test_state());

    let (status, _) = call(&router, "GET", "/v1/me", Some("3"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &router,
        "PUT",
        "/v1/me",
        Some("3"),
        Some(json!({ "name": "Grace", "email": "not-an-email" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_PARAMS");

    call(
        &router,
        "PUT",
        "/v1/me",
        Some("3"),
        Some(json!({ "name": "Grace", "email": "grace@example.com" })),
    )
    .await;
    let (status, body) = call(&router, "GET", "/v1/me", Some("3"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "grace@example.com");
    assert_eq!(body["owner_id"], 3);
}

#[tokio::test]
async fn test_non_integer_event_id_is_json_error() {
    let router = build_router(create_test_state());
    for method in ["GET", "DELETE"] {
        let (status, body) = call(&router, method, "/v1/events/abc", Some("1"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_PARAMS");
        assert!(body["message"].is_string());
    }

    let (status, body) = call(
        &router,
        "PUT",
        "/v1/events/1.5",
        Some("1"),
        Some(json!({ "title": "Nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_PARAMS");
}
