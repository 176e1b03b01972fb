//! API integration tests

use axum::body::Body;
use axum::Router;
use changeflow::models::User;
use changeflow::store::Store;
use changeflow::AppState;
use chrono::Utc;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

async fn setup_app() -> (Router, Store) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let store = Store::new(pool.clone());
    let state = AppState::new(pool);
    (changeflow::routes::router(state), store)
}

async fn seed_user(store: &Store, name: &str, configure: impl FnOnce(&mut User)) -> User {
    let mut user = User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        is_admin: false,
        can_create_rfcs: true,
        can_delete_any_rfc: false,
        can_edit_any_rfc: false,
        department_id: None,
        created_at: Utc::now(),
    };
    configure(&mut user);
    store.insert_user(&user).await.unwrap();
    user
}

async fn request(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _store) = setup_app().await;
    let (status, _) = request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_create_rfc_returns_draft() {
    let (app, store) = setup_app().await;
    let submitter = seed_user(&store, "Sam", |_| {}).await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/rfcs",
        Some(json!({
            "actor_id": submitter.id,
            "title": "Replace relief valve",
            "description": "PSV-101 upgrade"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "draft");
    assert!(body["moc_number"].as_str().unwrap().starts_with("MOC-"));
}

#[tokio::test]
async fn test_create_rfc_without_capability_is_forbidden() {
    let (app, store) = setup_app().await;
    let nobody = seed_user(&store, "Nobody", |u| u.can_create_rfcs = false).await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/rfcs",
        Some(json!({ "actor_id": nobody.id, "title": "X", "description": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_rfc_requires_title() {
    let (app, store) = setup_app().await;
    let submitter = seed_user(&store, "Sam", |_| {}).await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/rfcs",
        Some(json!({ "actor_id": submitter.id, "title": "  ", "description": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_rejects_unknown_status_filter() {
    let (app, store) = setup_app().await;
    let user = seed_user(&store, "Sam", |_| {}).await;

    let (status, _) = request(
        &app,
        "GET",
        &format!("/api/rfcs?actor_id={}&status=bogus", user.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_drafts_hidden_from_other_users() {
    let (app, store) = setup_app().await;
    let submitter = seed_user(&store, "Sam", |_| {}).await;
    let other = seed_user(&store, "Omar", |_| {}).await;

    let (_, created) = request(
        &app,
        "POST",
        "/api/rfcs",
        Some(json!({ "actor_id": submitter.id, "title": "Secret draft", "description": "" })),
    )
    .await;
    let rfc_id = created["id"].as_str().unwrap().to_string();

    let (_, listed) = request(
        &app,
        "GET",
        &format!("/api/rfcs?actor_id={}", other.id),
        None,
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 0);

    let (status, _) = request(
        &app,
        "GET",
        &format!("/api/rfcs/{}?actor_id={}", rfc_id, other.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(
        &app,
        "GET",
        &format!("/api/rfcs/{}?actor_id={}", rfc_id, submitter.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_detail_degrades_missing_department_name() {
    let (app, store) = setup_app().await;
    let submitter = seed_user(&store, "Sam", |_| {}).await;
    let ghost_department = Uuid::new_v4();

    let (_, created) = request(
        &app,
        "POST",
        "/api/rfcs",
        Some(json!({
            "actor_id": submitter.id,
            "title": "Dangling reference",
            "description": "",
            "departments_affected": [ghost_department]
        })),
    )
    .await;
    let rfc_id = created["id"].as_str().unwrap();

    let (status, detail) = request(
        &app,
        "GET",
        &format!("/api/rfcs/{}?actor_id={}", rfc_id, submitter.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["steps"][0]["department_name"], "N/A");
    assert_eq!(detail["submitter_name"], "Sam");
}

#[tokio::test]
async fn test_update_reports_changed_flag() {
    let (app, store) = setup_app().await;
    let submitter = seed_user(&store, "Sam", |_| {}).await;

    let (_, created) = request(
        &app,
        "POST",
        "/api/rfcs",
        Some(json!({ "actor_id": submitter.id, "title": "T", "description": "v1" })),
    )
    .await;
    let rfc_id = created["id"].as_str().unwrap().to_string();

    let (status, body) = request(
        &app,
        "PATCH",
        &format!("/api/rfcs/{}", rfc_id),
        Some(json!({ "actor_id": submitter.id, "title": "T", "description": "v2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);

    let (status, body) = request(
        &app,
        "PATCH",
        &format!("/api/rfcs/{}", rfc_id),
        Some(json!({ "actor_id": submitter.id, "title": "T", "description": "v2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], false);
}

#[tokio::test]
async fn test_edit_history_latest_per_editor() {
    let (app, store) = setup_app().await;
    let submitter = seed_user(&store, "Sam", |_| {}).await;

    let (_, created) = request(
        &app,
        "POST",
        "/api/rfcs",
        Some(json!({ "actor_id": submitter.id, "title": "T", "description": "v1" })),
    )
    .await;
    let rfc_id = created["id"].as_str().unwrap().to_string();

    for description in ["v2", "v3"] {
        request(
            &app,
            "PATCH",
            &format!("/api/rfcs/{}", rfc_id),
            Some(json!({ "actor_id": submitter.id, "title": "T", "description": description })),
        )
        .await;
    }

    let (status, history) = request(
        &app,
        "GET",
        &format!(
            "/api/rfcs/{}/history/latest?actor_id={}",
            rfc_id, submitter.id
        ),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["summary"], "Updated 1 field: description");
    assert_eq!(entries[0]["field_changes"][0]["old_value"], "v2");
    assert_eq!(entries[0]["field_changes"][0]["new_value"], "v3");
}

#[tokio::test]
async fn test_department_mutations_are_admin_only() {
    let (app, store) = setup_app().await;
    let user = seed_user(&store, "Sam", |_| {}).await;
    let admin = seed_user(&store, "Ada", |u| u.is_admin = true).await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/departments",
        Some(json!({ "actor_id": user.id, "name": "Operations" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, dept) = request(
        &app,
        "POST",
        "/api/departments",
        Some(json!({ "actor_id": admin.id, "name": "Operations" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(dept["name"], "Operations");

    // Duplicate name refused
    let (status, _) = request(
        &app,
        "POST",
        "/api/departments",
        Some(json!({ "actor_id": admin.id, "name": "Operations" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_department_delete_guarded_by_references() {
    let (app, store) = setup_app().await;
    let admin = seed_user(&store, "Ada", |u| u.is_admin = true).await;

    let (_, dept) = request(
        &app,
        "POST",
        "/api/departments",
        Some(json!({ "actor_id": admin.id, "name": "HSE" })),
    )
    .await;
    let dept_id = dept["id"].as_str().unwrap().to_string();

    request(
        &app,
        "POST",
        "/api/rfcs",
        Some(json!({
            "actor_id": admin.id,
            "title": "Uses HSE",
            "description": "",
            "departments_affected": [dept_id]
        })),
    )
    .await;

    let (status, _) = request(
        &app,
        "DELETE",
        &format!("/api/departments/{}?actor_id={}", dept_id, admin.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_creation_is_admin_only() {
    let (app, store) = setup_app().await;
    let user = seed_user(&store, "Sam", |_| {}).await;
    let admin = seed_user(&store, "Ada", |u| u.is_admin = true).await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/users",
        Some(json!({ "actor_id": user.id, "name": "New", "email": "new@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = request(
        &app,
        "POST",
        "/api/users",
        Some(json!({
            "actor_id": admin.id,
            "name": "New",
            "email": "new@example.com",
            "can_create_rfcs": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["can_create_rfcs"], true);
    assert_eq!(created["is_admin"], false);
}

#[tokio::test]
async fn test_notifications_listing_and_mark_read() {
    let (app, store) = setup_app().await;
    let submitter = seed_user(&store, "Sam", |_| {}).await;
    let assignee = seed_user(&store, "Avery", |_| {}).await;

    request(
        &app,
        "POST",
        "/api/rfcs",
        Some(json!({
            "actor_id": submitter.id,
            "title": "Assigned work",
            "description": "",
            "assigned_to_id": assignee.id
        })),
    )
    .await;

    let (status, notes) = request(
        &app,
        "GET",
        &format!("/api/notifications?user_id={}", assignee.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let notes = notes.as_array().unwrap().clone();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["kind"], "assignment");
    assert_eq!(notes[0]["read"], false);

    let note_id = notes[0]["id"].as_str().unwrap();
    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/notifications/{}/read", note_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, notes) = request(
        &app,
        "GET",
        &format!("/api/notifications?user_id={}", assignee.id),
        None,
    )
    .await;
    assert_eq!(notes[0]["read"], true);
}

#[tokio::test]
async fn test_delete_rfc_returns_no_content() {
    let (app, store) = setup_app().await;
    let submitter = seed_user(&store, "Sam", |_| {}).await;

    let (_, created) = request(
        &app,
        "POST",
        "/api/rfcs",
        Some(json!({ "actor_id": submitter.id, "title": "Doomed", "description": "" })),
    )
    .await;
    let rfc_id = created["id"].as_str().unwrap().to_string();

    let (status, _) = request(
        &app,
        "DELETE",
        &format!("/api/rfcs/{}?actor_id={}", rfc_id, submitter.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = request(
        &app,
        "GET",
        &format!("/api/rfcs/{}?actor_id={}", rfc_id, submitter.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_attachment_upload_and_listing() {
    let (app, store) = setup_app().await;
    let submitter = seed_user(&store, "Sam", |_| {}).await;

    let (_, created) = request(
        &app,
        "POST",
        "/api/rfcs",
        Some(json!({ "actor_id": submitter.id, "title": "With docs", "description": "" })),
    )
    .await;
    let rfc_id = created["id"].as_str().unwrap().to_string();

    let (status, attachment) = request(
        &app,
        "POST",
        &format!("/api/rfcs/{}/attachments", rfc_id),
        Some(json!({
            "actor_id": submitter.id,
            "storage_key": "blob/abc",
            "file_name": "risk-matrix.pdf",
            "file_type": "application/pdf",
            "byte_size": 2048
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(attachment["file_name"], "risk-matrix.pdf");

    let (status, listed) = request(
        &app,
        "GET",
        &format!("/api/rfcs/{}/attachments?actor_id={}", rfc_id, submitter.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}
