//! Database store for users, departments, RFC records and their side tables

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    ApprovalStep, Attachment, AuditEntry, Department, FieldChange, Notification, NotificationKind,
    RfcContent, RfcRecord, RfcStatus, User,
};

/// Database store
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| AppError::Internal(format!("JSON encode: {}", e)))
}

fn from_json<T: DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|e| AppError::Internal(format!("JSON decode: {}", e)))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Internal(format!("Invalid UUID: {}", e)))
}

fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
    s.map(|s| parse_uuid(&s)).transpose()
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The underlying pool; the workflow engine opens transactions on it
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // User operations

    pub async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, is_admin, can_create_rfcs,
                               can_delete_any_rfc, can_edit_any_rfc, department_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.is_admin)
        .bind(user.can_create_rfcs)
        .bind(user.can_delete_any_rfc)
        .bind(user.can_edit_any_rfc)
        .bind(user.department_id.map(|u| u.to_string()))
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User> {
        self.find_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, is_admin, can_create_rfcs, can_delete_any_rfc,
                   can_edit_any_rfc, department_id, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, is_admin, can_create_rfcs, can_delete_any_rfc,
                   can_edit_any_rfc, department_id, created_at
            FROM users
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn assign_user_department(
        &self,
        user_id: Uuid,
        department_id: Option<Uuid>,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE users SET department_id = ? WHERE id = ?")
            .bind(department_id.map(|u| u.to_string()))
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    // Department operations

    pub async fn create_department(
        &self,
        name: &str,
        description: Option<String>,
        approver_user_id: Option<Uuid>,
    ) -> Result<Department> {
        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM departments WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::Validation(
                "A department with this name already exists".to_string(),
            ));
        }

        let department = Department {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description,
            approver_user_id,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO departments (id, name, description, approver_user_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(department.id.to_string())
        .bind(&department.name)
        .bind(&department.description)
        .bind(department.approver_user_id.map(|u| u.to_string()))
        .bind(department.created_at)
        .execute(&self.pool)
        .await?;

        Ok(department)
    }

    pub async fn get_department(&self, id: Uuid) -> Result<Department> {
        self.find_department(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Department {} not found", id)))
    }

    /// Lookup that degrades to None for dangling references
    pub async fn find_department(&self, id: Uuid) -> Result<Option<Department>> {
        let row = sqlx::query_as::<_, DepartmentRow>(
            r#"
            SELECT id, name, description, approver_user_id, created_at
            FROM departments
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    pub async fn list_departments(&self) -> Result<Vec<Department>> {
        let rows = sqlx::query_as::<_, DepartmentRow>(
            r#"
            SELECT id, name, description, approver_user_id, created_at
            FROM departments
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn update_department(
        &self,
        id: Uuid,
        name: Option<String>,
        description: Option<String>,
        approver_user_id: Option<Uuid>,
    ) -> Result<Department> {
        let mut department = self.get_department(id).await?;

        if let Some(new_name) = name {
            let dup: Option<(String,)> =
                sqlx::query_as("SELECT id FROM departments WHERE name = ? AND id != ?")
                    .bind(&new_name)
                    .bind(id.to_string())
                    .fetch_optional(&self.pool)
                    .await?;
            if dup.is_some() {
                return Err(AppError::Validation(
                    "A department with this name already exists".to_string(),
                ));
            }
            department.name = new_name;
        }
        if description.is_some() {
            department.description = description;
        }
        department.approver_user_id = approver_user_id.or(department.approver_user_id);

        sqlx::query("UPDATE departments SET name = ?, description = ?, approver_user_id = ? WHERE id = ?")
            .bind(&department.name)
            .bind(&department.description)
            .bind(department.approver_user_id.map(|u| u.to_string()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(department)
    }

    /// Delete a department. Refused while users are assigned to it or any
    /// RFC references it, so no record is left with a dangling registry entry.
    pub async fn delete_department(&self, id: Uuid) -> Result<()> {
        self.get_department(id).await?;

        let (user_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE department_id = ?")
                .bind(id.to_string())
                .fetch_one(&self.pool)
                .await?;
        if user_count > 0 {
            return Err(AppError::Validation(
                "Cannot delete department with assigned users. Reassign users first.".to_string(),
            ));
        }

        let needle = format!("%\"{}\"%", id);
        let (rfc_count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM rfc_requests
            WHERE requested_by_department = ? OR departments_affected LIKE ?
            "#,
        )
        .bind(id.to_string())
        .bind(&needle)
        .fetch_one(&self.pool)
        .await?;
        if rfc_count > 0 {
            return Err(AppError::Validation(
                "Cannot delete department with associated RFCs.".to_string(),
            ));
        }

        sqlx::query("DELETE FROM departments WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // RFC operations

    pub async fn insert_rfc(&self, record: &RfcRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rfc_requests (
                id, moc_number, status, submitter_id, assigned_to_id, technical_authority_id,
                requested_by_department, additional_approver_ids, viewer_ids,
                departments_affected, department_approvals, content,
                reviewer_id, reviewed_at, review_comments, submitted_at, date_raised, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.moc_number)
        .bind(record.status.as_str())
        .bind(record.submitter_id.to_string())
        .bind(record.assigned_to_id.map(|u| u.to_string()))
        .bind(record.technical_authority_id.map(|u| u.to_string()))
        .bind(record.requested_by_department.map(|u| u.to_string()))
        .bind(to_json(&record.additional_approver_ids)?)
        .bind(to_json(&record.viewer_ids)?)
        .bind(to_json(&record.departments_affected)?)
        .bind(to_json(&record.department_approvals)?)
        .bind(to_json(&record.content)?)
        .bind(record.reviewer_id.map(|u| u.to_string()))
        .bind(record.reviewed_at)
        .bind(&record.review_comments)
        .bind(record.submitted_at)
        .bind(record.date_raised)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_rfc(&self, id: Uuid) -> Result<RfcRecord> {
        let mut conn = self.pool.acquire().await?;
        Self::get_rfc_with(&mut conn, id).await
    }

    /// Fetch a record on an explicit connection, so workflow mutations can
    /// re-read inside the same transaction that applies the change.
    pub async fn get_rfc_with(conn: &mut SqliteConnection, id: Uuid) -> Result<RfcRecord> {
        let row = sqlx::query_as::<_, RfcRow>(
            r#"
            SELECT id, moc_number, status, submitter_id, assigned_to_id, technical_authority_id,
                   requested_by_department, additional_approver_ids, viewer_ids,
                   departments_affected, department_approvals, content,
                   reviewer_id, reviewed_at, review_comments, submitted_at, date_raised, updated_at
            FROM rfc_requests
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("RFC {} not found", id)))?;

        row.try_into()
    }

    pub async fn list_rfcs(&self, status: Option<RfcStatus>) -> Result<Vec<RfcRecord>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, RfcRow>(
                    r#"
                    SELECT id, moc_number, status, submitter_id, assigned_to_id, technical_authority_id,
                           requested_by_department, additional_approver_ids, viewer_ids,
                           departments_affected, department_approvals, content,
                           reviewer_id, reviewed_at, review_comments, submitted_at, date_raised, updated_at
                    FROM rfc_requests
                    WHERE status = ?
                    ORDER BY date_raised DESC
                    "#,
                )
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, RfcRow>(
                    r#"
                    SELECT id, moc_number, status, submitter_id, assigned_to_id, technical_authority_id,
                           requested_by_department, additional_approver_ids, viewer_ids,
                           departments_affected, department_approvals, content,
                           reviewer_id, reviewed_at, review_comments, submitted_at, date_raised, updated_at
                    FROM rfc_requests
                    ORDER BY date_raised DESC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Write back every mutable column of a record
    pub async fn save_rfc_with(conn: &mut SqliteConnection, record: &RfcRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE rfc_requests SET
                status = ?, assigned_to_id = ?, technical_authority_id = ?,
                requested_by_department = ?, additional_approver_ids = ?, viewer_ids = ?,
                departments_affected = ?, department_approvals = ?, content = ?,
                reviewer_id = ?, reviewed_at = ?, review_comments = ?,
                submitted_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(record.status.as_str())
        .bind(record.assigned_to_id.map(|u| u.to_string()))
        .bind(record.technical_authority_id.map(|u| u.to_string()))
        .bind(record.requested_by_department.map(|u| u.to_string()))
        .bind(to_json(&record.additional_approver_ids)?)
        .bind(to_json(&record.viewer_ids)?)
        .bind(to_json(&record.departments_affected)?)
        .bind(to_json(&record.department_approvals)?)
        .bind(to_json(&record.content)?)
        .bind(record.reviewer_id.map(|u| u.to_string()))
        .bind(record.reviewed_at)
        .bind(&record.review_comments)
        .bind(record.submitted_at)
        .bind(record.updated_at)
        .bind(record.id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn delete_rfc_with(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM rfc_requests WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    // Attachment operations

    pub async fn add_attachment(&self, attachment: &Attachment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO attachments (id, rfc_id, storage_key, file_name, file_type,
                                     byte_size, uploaded_by_id, uploaded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(attachment.id.to_string())
        .bind(attachment.rfc_id.to_string())
        .bind(&attachment.storage_key)
        .bind(&attachment.file_name)
        .bind(&attachment.file_type)
        .bind(attachment.byte_size)
        .bind(attachment.uploaded_by_id.to_string())
        .bind(attachment.uploaded_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_attachments(&self, rfc_id: Uuid) -> Result<Vec<Attachment>> {
        let mut conn = self.pool.acquire().await?;
        Self::list_attachments_with(&mut conn, rfc_id).await
    }

    pub async fn list_attachments_with(
        conn: &mut SqliteConnection,
        rfc_id: Uuid,
    ) -> Result<Vec<Attachment>> {
        let rows = sqlx::query_as::<_, AttachmentRow>(
            r#"
            SELECT id, rfc_id, storage_key, file_name, file_type, byte_size,
                   uploaded_by_id, uploaded_at
            FROM attachments
            WHERE rfc_id = ?
            ORDER BY uploaded_at ASC
            "#,
        )
        .bind(rfc_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn delete_attachments_with(conn: &mut SqliteConnection, rfc_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM attachments WHERE rfc_id = ?")
            .bind(rfc_id.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    // Notification operations

    pub async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, actor_id, rfc_id, related_title,
                                       kind, message, read, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(notification.id.to_string())
        .bind(notification.recipient_id.to_string())
        .bind(notification.actor_id.to_string())
        .bind(notification.rfc_id.to_string())
        .bind(&notification.related_title)
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_notifications(&self, recipient_id: Uuid) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, recipient_id, actor_id, rfc_id, related_title, kind, message, read, created_at
            FROM notifications
            WHERE recipient_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(recipient_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn mark_notification_read(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(())
    }

    pub async fn delete_notifications_for_rfc_with(
        conn: &mut SqliteConnection,
        rfc_id: Uuid,
    ) -> Result<()> {
        sqlx::query("DELETE FROM notifications WHERE rfc_id = ?")
            .bind(rfc_id.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    // Edit history operations

    /// Replace the live audit entry for (editor, record): delete any prior
    /// entry by this editor, then insert the new one.
    pub async fn replace_edit_entry(&self, entry: &AuditEntry) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM edit_history WHERE rfc_id = ? AND editor_id = ?")
            .bind(entry.rfc_id.to_string())
            .bind(entry.editor_id.to_string())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO edit_history (id, rfc_id, editor_id, editor_name, summary,
                                      field_changes, edited_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.rfc_id.to_string())
        .bind(entry.editor_id.to_string())
        .bind(&entry.editor_name)
        .bind(&entry.summary)
        .bind(to_json(&entry.field_changes)?)
        .bind(entry.edited_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_edit_history(&self, rfc_id: Uuid) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, EditRow>(
            r#"
            SELECT id, rfc_id, editor_id, editor_name, summary, field_changes, edited_at
            FROM edit_history
            WHERE rfc_id = ?
            ORDER BY edited_at DESC
            "#,
        )
        .bind(rfc_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// One entry per distinct editor, most recent first
    pub async fn latest_edit_per_user(&self, rfc_id: Uuid) -> Result<Vec<AuditEntry>> {
        let all = self.list_edit_history(rfc_id).await?;
        let mut seen = std::collections::HashSet::new();
        Ok(all
            .into_iter()
            .filter(|e| seen.insert(e.editor_id))
            .collect())
    }

    pub async fn delete_edit_history_for_rfc_with(
        conn: &mut SqliteConnection,
        rfc_id: Uuid,
    ) -> Result<()> {
        sqlx::query("DELETE FROM edit_history WHERE rfc_id = ?")
            .bind(rfc_id.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

// Internal row types for sqlx

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    is_admin: bool,
    can_create_rfcs: bool,
    can_delete_any_rfc: bool,
    can_edit_any_rfc: bool,
    department_id: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_uuid(&row.id)?,
            name: row.name,
            email: row.email,
            is_admin: row.is_admin,
            can_create_rfcs: row.can_create_rfcs,
            can_delete_any_rfc: row.can_delete_any_rfc,
            can_edit_any_rfc: row.can_edit_any_rfc,
            department_id: parse_opt_uuid(row.department_id)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DepartmentRow {
    id: String,
    name: String,
    description: Option<String>,
    approver_user_id: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

impl TryFrom<DepartmentRow> for Department {
    type Error = AppError;

    fn try_from(row: DepartmentRow) -> Result<Self> {
        Ok(Department {
            id: parse_uuid(&row.id)?,
            name: row.name,
            description: row.description,
            approver_user_id: parse_opt_uuid(row.approver_user_id)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RfcRow {
    id: String,
    moc_number: String,
    status: String,
    submitter_id: String,
    assigned_to_id: Option<String>,
    technical_authority_id: Option<String>,
    requested_by_department: Option<String>,
    additional_approver_ids: String,
    viewer_ids: String,
    departments_affected: String,
    department_approvals: String,
    content: String,
    reviewer_id: Option<String>,
    reviewed_at: Option<chrono::DateTime<Utc>>,
    review_comments: Option<String>,
    submitted_at: Option<chrono::DateTime<Utc>>,
    date_raised: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl TryFrom<RfcRow> for RfcRecord {
    type Error = AppError;

    fn try_from(row: RfcRow) -> Result<Self> {
        let status: RfcStatus = row
            .status
            .parse()
            .map_err(|e: String| AppError::Internal(e))?;
        let department_approvals: Vec<ApprovalStep> = from_json(&row.department_approvals)?;
        let content: RfcContent = from_json(&row.content)?;

        Ok(RfcRecord {
            id: parse_uuid(&row.id)?,
            moc_number: row.moc_number,
            status,
            submitter_id: parse_uuid(&row.submitter_id)?,
            assigned_to_id: parse_opt_uuid(row.assigned_to_id)?,
            technical_authority_id: parse_opt_uuid(row.technical_authority_id)?,
            requested_by_department: parse_opt_uuid(row.requested_by_department)?,
            additional_approver_ids: from_json(&row.additional_approver_ids)?,
            viewer_ids: from_json(&row.viewer_ids)?,
            departments_affected: from_json(&row.departments_affected)?,
            department_approvals,
            content,
            reviewer_id: parse_opt_uuid(row.reviewer_id)?,
            reviewed_at: row.reviewed_at,
            review_comments: row.review_comments,
            submitted_at: row.submitted_at,
            date_raised: row.date_raised,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AttachmentRow {
    id: String,
    rfc_id: String,
    storage_key: String,
    file_name: String,
    file_type: String,
    byte_size: Option<i64>,
    uploaded_by_id: String,
    uploaded_at: chrono::DateTime<Utc>,
}

impl TryFrom<AttachmentRow> for Attachment {
    type Error = AppError;

    fn try_from(row: AttachmentRow) -> Result<Self> {
        Ok(Attachment {
            id: parse_uuid(&row.id)?,
            rfc_id: parse_uuid(&row.rfc_id)?,
            storage_key: row.storage_key,
            file_name: row.file_name,
            file_type: row.file_type,
            byte_size: row.byte_size,
            uploaded_by_id: parse_uuid(&row.uploaded_by_id)?,
            uploaded_at: row.uploaded_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    recipient_id: String,
    actor_id: String,
    rfc_id: String,
    related_title: String,
    kind: String,
    message: String,
    read: bool,
    created_at: chrono::DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self> {
        let kind: NotificationKind = row
            .kind
            .parse()
            .map_err(|e: String| AppError::Internal(e))?;
        Ok(Notification {
            id: parse_uuid(&row.id)?,
            recipient_id: parse_uuid(&row.recipient_id)?,
            actor_id: parse_uuid(&row.actor_id)?,
            rfc_id: parse_uuid(&row.rfc_id)?,
            related_title: row.related_title,
            kind,
            message: row.message,
            read: row.read,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EditRow {
    id: String,
    rfc_id: String,
    editor_id: String,
    editor_name: String,
    summary: String,
    field_changes: String,
    edited_at: chrono::DateTime<Utc>,
}

impl TryFrom<EditRow> for AuditEntry {
    type Error = AppError;

    fn try_from(row: EditRow) -> Result<Self> {
        let field_changes: Vec<FieldChange> = from_json(&row.field_changes)?;
        Ok(AuditEntry {
            id: parse_uuid(&row.id)?,
            rfc_id: parse_uuid(&row.rfc_id)?,
            editor_id: parse_uuid(&row.editor_id)?,
            editor_name: row.editor_name,
            summary: row.summary,
            field_changes,
            edited_at: row.edited_at,
        })
    }
}
