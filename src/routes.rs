//! HTTP surface: thin axum handlers over the workflow engine and store.
//!
//! Every mutation carries an explicit `actor_id`; reads that are scoped to a
//! viewer take `?actor_id=`. Handlers translate between wire DTOs and engine
//! calls and do no workflow logic of their own.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    Attachment, AuditEntry, Department, Notification, RfcPayload, RfcRecord, RfcStatus,
    StepDecision, User,
};
use crate::store::Store;
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/rfcs", post(create_rfc).get(list_rfcs))
        .route("/api/rfcs/:id", get(get_rfc).patch(update_rfc).delete(delete_rfc))
        .route("/api/rfcs/:id/status", post(change_status))
        .route("/api/rfcs/:id/resubmit", post(resubmit))
        .route(
            "/api/rfcs/:id/departments/:dept/decision",
            post(decide_department),
        )
        .route("/api/rfcs/:id/history", get(edit_history))
        .route("/api/rfcs/:id/history/latest", get(edit_history_latest))
        .route(
            "/api/rfcs/:id/attachments",
            post(add_attachment).get(list_attachments),
        )
        .route("/api/departments", get(list_departments).post(create_department))
        .route(
            "/api/departments/:id",
            patch(update_department).delete(delete_department),
        )
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/:id/read", post(mark_notification_read))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

// Display-name lookups for read models. Missing references degrade to a
// placeholder instead of failing the read.

struct NameCache<'a> {
    store: &'a Store,
    users: HashMap<Uuid, String>,
    departments: HashMap<Uuid, String>,
}

impl<'a> NameCache<'a> {
    fn new(store: &'a Store) -> Self {
        Self {
            store,
            users: HashMap::new(),
            departments: HashMap::new(),
        }
    }

    async fn user_name(&mut self, id: Uuid) -> Result<String> {
        if let Some(name) = self.users.get(&id) {
            return Ok(name.clone());
        }
        let name = self
            .store
            .find_user(id)
            .await?
            .map(|u| u.display_name().to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        self.users.insert(id, name.clone());
        Ok(name)
    }

    async fn opt_user_name(&mut self, id: Option<Uuid>) -> Result<Option<String>> {
        match id {
            Some(id) => Ok(Some(self.user_name(id).await?)),
            None => Ok(None),
        }
    }

    async fn department_name(&mut self, id: Uuid) -> Result<String> {
        if let Some(name) = self.departments.get(&id) {
            return Ok(name.clone());
        }
        let name = self
            .store
            .find_department(id)
            .await?
            .map(|d| d.name)
            .unwrap_or_else(|| "N/A".to_string());
        self.departments.insert(id, name.clone());
        Ok(name)
    }
}

// RFC endpoints

#[derive(Deserialize)]
struct ActorBody {
    actor_id: Uuid,
    #[serde(flatten)]
    payload: RfcPayload,
}

#[derive(Deserialize)]
struct ActorQuery {
    actor_id: Uuid,
}

#[derive(Serialize)]
struct RfcSummary {
    id: Uuid,
    moc_number: String,
    status: RfcStatus,
    title: String,
    submitter_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    assigned_to_name: Option<String>,
    date_raised: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct StepView {
    department_id: Uuid,
    department_name: String,
    status: crate::models::StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    approver_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    approver_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comments: Option<String>,
}

#[derive(Serialize)]
struct RfcDetail {
    #[serde(flatten)]
    record: RfcRecord,
    submitter_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    assigned_to_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    technical_authority_name: Option<String>,
    steps: Vec<StepView>,
    attachments: Vec<Attachment>,
}

async fn build_detail(store: &Store, record: RfcRecord) -> Result<RfcDetail> {
    let mut names = NameCache::new(store);
    let submitter_name = names.user_name(record.submitter_id).await?;
    let assigned_to_name = names.opt_user_name(record.assigned_to_id).await?;
    let technical_authority_name = names.opt_user_name(record.technical_authority_id).await?;

    let mut steps = Vec::with_capacity(record.department_approvals.len());
    for step in &record.department_approvals {
        steps.push(StepView {
            department_id: step.department_id,
            department_name: names.department_name(step.department_id).await?,
            status: step.status,
            approver_id: step.approver_id,
            approver_name: names.opt_user_name(step.approver_id).await?,
            approved_at: step.approved_at,
            comments: step.comments.clone(),
        });
    }

    let attachments = store.list_attachments(record.id).await?;
    Ok(RfcDetail {
        record,
        submitter_name,
        assigned_to_name,
        technical_authority_name,
        steps,
        attachments,
    })
}

async fn create_rfc(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ActorBody>,
) -> Result<(StatusCode, Json<RfcRecord>)> {
    let record = state.engine.create_rfc(body.actor_id, body.payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Deserialize)]
struct ListQuery {
    actor_id: Uuid,
    status: Option<String>,
}

async fn list_rfcs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<RfcSummary>>> {
    let status = query
        .status
        .map(|s| s.parse::<RfcStatus>())
        .transpose()
        .map_err(AppError::Validation)?;

    let records = state.engine.list_rfcs_for(query.actor_id, status).await?;
    let store = state.engine.store();
    let mut names = NameCache::new(store);

    let mut summaries = Vec::with_capacity(records.len());
    for record in records {
        summaries.push(RfcSummary {
            id: record.id,
            moc_number: record.moc_number,
            status: record.status,
            title: record.content.title,
            submitter_name: names.user_name(record.submitter_id).await?,
            assigned_to_name: names.opt_user_name(record.assigned_to_id).await?,
            date_raised: record.date_raised,
            updated_at: record.updated_at,
        });
    }
    Ok(Json(summaries))
}

async fn get_rfc(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<RfcDetail>> {
    let record = state.engine.get_rfc_for(query.actor_id, id).await?;
    let detail = build_detail(state.engine.store(), record).await?;
    Ok(Json(detail))
}

#[derive(Serialize)]
struct UpdateResponse {
    changed: bool,
    #[serde(flatten)]
    record: RfcRecord,
}

async fn update_rfc(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ActorBody>,
) -> Result<Json<UpdateResponse>> {
    let (record, changed) = state
        .engine
        .update_rfc(body.actor_id, id, body.payload)
        .await?;
    Ok(Json(UpdateResponse { changed, record }))
}

#[derive(Deserialize)]
struct StatusBody {
    actor_id: Uuid,
    new_status: String,
    comments: Option<String>,
}

async fn change_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusBody>,
) -> Result<Json<RfcRecord>> {
    let new_status: RfcStatus = body.new_status.parse().map_err(AppError::Validation)?;
    let record = state
        .engine
        .change_status(body.actor_id, id, new_status, body.comments)
        .await?;
    Ok(Json(record))
}

#[derive(Deserialize)]
struct ResubmitBody {
    actor_id: Uuid,
}

async fn resubmit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ResubmitBody>,
) -> Result<Json<RfcRecord>> {
    let record = state.engine.resubmit(body.actor_id, id).await?;
    Ok(Json(record))
}

#[derive(Deserialize)]
struct DecisionBody {
    actor_id: Uuid,
    decision: String,
    comments: Option<String>,
}

async fn decide_department(
    State(state): State<Arc<AppState>>,
    Path((id, dept)): Path<(Uuid, Uuid)>,
    Json(body): Json<DecisionBody>,
) -> Result<Json<RfcRecord>> {
    let decision: StepDecision = body.decision.parse().map_err(AppError::Validation)?;
    let record = state
        .engine
        .decide_department_step(body.actor_id, id, dept, decision, body.comments)
        .await?;
    Ok(Json(record))
}

async fn delete_rfc(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ActorQuery>,
) -> Result<StatusCode> {
    state.engine.delete_rfc(query.actor_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn edit_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<Vec<AuditEntry>>> {
    state.engine.get_rfc_for(query.actor_id, id).await?;
    let entries = state.engine.store().list_edit_history(id).await?;
    Ok(Json(entries))
}

async fn edit_history_latest(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<Vec<AuditEntry>>> {
    state.engine.get_rfc_for(query.actor_id, id).await?;
    let entries = state.engine.store().latest_edit_per_user(id).await?;
    Ok(Json(entries))
}

#[derive(Deserialize)]
struct AttachmentBody {
    actor_id: Uuid,
    storage_key: String,
    file_name: String,
    file_type: String,
    byte_size: Option<i64>,
}

async fn add_attachment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<AttachmentBody>,
) -> Result<(StatusCode, Json<Attachment>)> {
    let attachment = state
        .engine
        .add_attachment(
            body.actor_id,
            id,
            body.storage_key,
            body.file_name,
            body.file_type,
            body.byte_size,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

async fn list_attachments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<Vec<Attachment>>> {
    state.engine.get_rfc_for(query.actor_id, id).await?;
    let attachments = state.engine.store().list_attachments(id).await?;
    Ok(Json(attachments))
}

// Department registry (admin-only mutations)

async fn require_admin(store: &Store, actor_id: Uuid) -> Result<User> {
    let actor = store.get_user(actor_id).await?;
    if actor.is_admin {
        Ok(actor)
    } else {
        Err(AppError::PermissionDenied(
            "administrator access required".to_string(),
        ))
    }
}

async fn list_departments(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Department>>> {
    let departments = state.engine.store().list_departments().await?;
    Ok(Json(departments))
}

#[derive(Deserialize)]
struct CreateDepartmentBody {
    actor_id: Uuid,
    name: String,
    description: Option<String>,
    approver_user_id: Option<Uuid>,
}

async fn create_department(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateDepartmentBody>,
) -> Result<(StatusCode, Json<Department>)> {
    let store = state.engine.store();
    require_admin(store, body.actor_id).await?;
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    let department = store
        .create_department(body.name.trim(), body.description, body.approver_user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(department)))
}

#[derive(Deserialize)]
struct UpdateDepartmentBody {
    actor_id: Uuid,
    name: Option<String>,
    description: Option<String>,
    approver_user_id: Option<Uuid>,
}

async fn update_department(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateDepartmentBody>,
) -> Result<Json<Department>> {
    let store = state.engine.store();
    require_admin(store, body.actor_id).await?;
    let department = store
        .update_department(id, body.name, body.description, body.approver_user_id)
        .await?;
    Ok(Json(department))
}

async fn delete_department(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ActorQuery>,
) -> Result<StatusCode> {
    let store = state.engine.store();
    require_admin(store, query.actor_id).await?;
    store.delete_department(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// User registry

#[derive(Deserialize)]
struct CreateUserBody {
    actor_id: Uuid,
    name: String,
    email: String,
    #[serde(default)]
    is_admin: bool,
    #[serde(default)]
    can_create_rfcs: bool,
    #[serde(default)]
    can_delete_any_rfc: bool,
    #[serde(default)]
    can_edit_any_rfc: bool,
    department_id: Option<Uuid>,
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateUserBody>,
) -> Result<(StatusCode, Json<User>)> {
    let store = state.engine.store();
    require_admin(store, body.actor_id).await?;
    if body.email.trim().is_empty() {
        return Err(AppError::Validation("email is required".to_string()));
    }

    let user = User {
        id: Uuid::new_v4(),
        name: body.name,
        email: body.email,
        is_admin: body.is_admin,
        can_create_rfcs: body.can_create_rfcs,
        can_delete_any_rfc: body.can_delete_any_rfc,
        can_edit_any_rfc: body.can_edit_any_rfc,
        department_id: body.department_id,
        created_at: Utc::now(),
    };
    store.insert_user(&user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>> {
    let users = state.engine.store().list_users().await?;
    Ok(Json(users))
}

// Notifications

#[derive(Deserialize)]
struct NotificationQuery {
    user_id: Uuid,
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>> {
    let notifications = state.engine.store().list_notifications(query.user_id).await?;
    Ok(Json(notifications))
}

async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.engine.store().mark_notification_read(id).await?;
    Ok(StatusCode::OK)
}
