//! The workflow engine: every mutation of an RFC record goes through here.
//!
//! Each intent is one sqlx transaction. Registry lookups (users, departments)
//! happen before the transaction opens; the record itself is re-read inside
//! it so concurrent decisions on the same record serialize cleanly. Audit and
//! notification writes happen after commit and never roll a mutation back.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::attachments::BlobStore;
use crate::error::{AppError, Result};
use crate::models::{
    ApprovalStep, Attachment, RfcPayload, RfcRecord, RfcStatus, StepDecision, StepStatus,
};
use crate::store::Store;
use crate::workflow::{audit, notify, permissions};
use crate::workflow::notify::WorkflowEvent;

#[derive(Clone)]
pub struct WorkflowEngine {
    store: Store,
    blob: Arc<dyn BlobStore>,
}

/// Designated approver per department, resolved from the registry
type DesigneeMap = HashMap<Uuid, Option<Uuid>>;

fn fresh_steps(departments: &[Uuid], designees: &DesigneeMap) -> Vec<ApprovalStep> {
    departments
        .iter()
        .map(|d| ApprovalStep::pending(*d, designees.get(d).copied().flatten()))
        .collect()
}

/// Rebuild steps for a changed department list, keeping the recorded outcome
/// of departments that remain affected.
fn merged_steps(
    old: &[ApprovalStep],
    departments: &[Uuid],
    designees: &DesigneeMap,
) -> Vec<ApprovalStep> {
    departments
        .iter()
        .map(|d| {
            old.iter()
                .find(|s| s.department_id == *d)
                .cloned()
                .unwrap_or_else(|| ApprovalStep::pending(*d, designees.get(d).copied().flatten()))
        })
        .collect()
}

fn dedup_in_order(ids: &[Uuid]) -> Vec<Uuid> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

fn same_set(a: &[Uuid], b: &[Uuid]) -> bool {
    let mut a: Vec<Uuid> = a.to_vec();
    let mut b: Vec<Uuid> = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

fn moc_number() -> String {
    format!("MOC-{:06}", Utc::now().timestamp_millis() % 1_000_000)
}

impl WorkflowEngine {
    pub fn new(store: Store, blob: Arc<dyn BlobStore>) -> Self {
        Self { store, blob }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    async fn resolve_designees(&self, departments: &[Uuid]) -> Result<DesigneeMap> {
        let mut map = DesigneeMap::new();
        for id in departments {
            let approver = self
                .store
                .find_department(*id)
                .await?
                .and_then(|d| d.approver_user_id);
            map.insert(*id, approver);
        }
        Ok(map)
    }

    pub async fn create_rfc(&self, actor_id: Uuid, mut payload: RfcPayload) -> Result<RfcRecord> {
        let actor = self.store.get_user(actor_id).await?;
        permissions::ensure_can_create(&actor)?;

        if payload.content.title.trim().is_empty() {
            return Err(AppError::Validation("title is required".to_string()));
        }

        payload.departments_affected = dedup_in_order(&payload.departments_affected);
        let designees = self.resolve_designees(&payload.departments_affected).await?;

        let now = Utc::now();
        let record = RfcRecord {
            id: Uuid::new_v4(),
            moc_number: moc_number(),
            status: RfcStatus::Draft,
            submitter_id: actor.id,
            assigned_to_id: payload.assigned_to_id,
            technical_authority_id: payload.technical_authority_id,
            requested_by_department: payload.requested_by_department,
            additional_approver_ids: payload.additional_approver_ids.clone(),
            viewer_ids: payload.viewer_ids.clone(),
            departments_affected: payload.departments_affected.clone(),
            department_approvals: fresh_steps(&payload.departments_affected, &designees),
            content: payload.content,
            reviewer_id: None,
            reviewed_at: None,
            review_comments: None,
            submitted_at: None,
            date_raised: now,
            updated_at: now,
        };

        self.store.insert_rfc(&record).await?;
        tracing::info!("created {} ({})", record.moc_number, record.id);

        let mut notifications = Vec::new();
        if let Some(assignee) = record.assigned_to_id {
            notifications.extend(notify::fan_out(
                &record,
                actor.id,
                &WorkflowEvent::Assigned { assignee },
            ));
        }
        if let Some(authority) = record.technical_authority_id {
            notifications.extend(notify::fan_out(
                &record,
                actor.id,
                &WorkflowEvent::TechnicalAuthorityAssigned { authority },
            ));
        }
        notify::deliver(&self.store, notifications).await;

        Ok(record)
    }

    /// Apply a payload edit. Returns the record and whether anything changed;
    /// a value-identical payload is a no-op with no side effects at all.
    pub async fn update_rfc(
        &self,
        actor_id: Uuid,
        rfc_id: Uuid,
        mut payload: RfcPayload,
    ) -> Result<(RfcRecord, bool)> {
        let actor = self.store.get_user(actor_id).await?;

        if payload.content.title.trim().is_empty() {
            return Err(AppError::Validation("title is required".to_string()));
        }
        payload.departments_affected = dedup_in_order(&payload.departments_affected);
        let designees = self.resolve_designees(&payload.departments_affected).await?;

        let mut tx = self.store.pool().begin().await?;
        let mut record = Store::get_rfc_with(&mut tx, rfc_id).await?;
        permissions::ensure_can_edit(&actor, &record)?;

        let old_payload = record.payload();
        let changes = audit::diff_payloads(&old_payload, &payload)?;
        if changes.is_empty() {
            return Ok((record, false));
        }

        let mut events = Vec::new();
        if payload.assigned_to_id != old_payload.assigned_to_id {
            if let Some(assignee) = payload.assigned_to_id {
                events.push(WorkflowEvent::Assigned { assignee });
            }
        }
        if payload.technical_authority_id != old_payload.technical_authority_id {
            if let Some(authority) = payload.technical_authority_id {
                events.push(WorkflowEvent::TechnicalAuthorityAssigned { authority });
            }
        }

        let departments_changed =
            !same_set(&old_payload.departments_affected, &payload.departments_affected);
        let old_status = record.status;
        record.apply_payload(payload);

        if old_status.is_pending_review() {
            // Substantive edit mid-review: back to draft, all approvals void
            record.status = RfcStatus::Draft;
            record.submitted_at = None;
            record.clear_review();
            record.department_approvals = fresh_steps(&record.departments_affected, &designees);
            events.push(WorkflowEvent::StatusChanged {
                old: old_status,
                new: RfcStatus::Draft,
            });
        } else if departments_changed {
            record.department_approvals = merged_steps(
                &record.department_approvals,
                &record.departments_affected,
                &designees,
            );
        }

        record.updated_at = Utc::now();
        Store::save_rfc_with(&mut tx, &record).await?;
        tx.commit().await?;

        audit::record_edit(&self.store, record.id, &actor, changes).await;
        let notifications = events
            .iter()
            .flat_map(|e| notify::fan_out(&record, actor.id, e))
            .collect();
        notify::deliver(&self.store, notifications).await;

        Ok((record, true))
    }

    pub async fn change_status(
        &self,
        actor_id: Uuid,
        rfc_id: Uuid,
        new_status: RfcStatus,
        comments: Option<String>,
    ) -> Result<RfcRecord> {
        let actor = self.store.get_user(actor_id).await?;

        // Designees are only needed when (re)entering the department stage
        let pre = self.store.get_rfc(rfc_id).await?;
        let designees = if new_status == RfcStatus::PendingDepartmentApproval {
            self.resolve_designees(&pre.departments_affected).await?
        } else {
            DesigneeMap::new()
        };

        let mut tx = self.store.pool().begin().await?;
        let mut record = Store::get_rfc_with(&mut tx, rfc_id).await?;

        let rule = permissions::transition_rule(record.status, new_status)
            .ok_or_else(|| AppError::transition(record.status, new_status))?;
        permissions::authorize_transition(&actor, &record, rule)?;

        let old_status = record.status;
        let now = Utc::now();
        match new_status {
            RfcStatus::PendingDepartmentApproval => {
                record.submitted_at = Some(now);
                record.clear_review();
                record.department_approvals =
                    fresh_steps(&record.departments_affected, &designees);
            }
            RfcStatus::Approved => {
                record.reviewer_id = Some(actor.id);
                record.reviewed_at = Some(now);
                record.review_comments = comments;
            }
            RfcStatus::Rejected => {
                record.reviewer_id = Some(actor.id);
                record.reviewed_at = Some(now);
                record.review_comments =
                    comments.or_else(|| Some("Rejected by administrator".to_string()));
            }
            _ => {}
        }
        record.status = new_status;
        record.updated_at = now;

        Store::save_rfc_with(&mut tx, &record).await?;
        tx.commit().await?;
        tracing::info!(
            "{} moved from {} to {}",
            record.moc_number,
            old_status.as_str(),
            new_status.as_str()
        );

        let mut notifications = notify::fan_out(
            &record,
            actor.id,
            &WorkflowEvent::StatusChanged {
                old: old_status,
                new: new_status,
            },
        );
        if new_status == RfcStatus::PendingDepartmentApproval {
            notifications.extend(notify::fan_out(
                &record,
                actor.id,
                &WorkflowEvent::ApprovalsPending,
            ));
        }
        notify::deliver(&self.store, notifications).await;

        Ok(record)
    }

    /// Send a draft or rejected record back into the approval cycle
    pub async fn resubmit(&self, actor_id: Uuid, rfc_id: Uuid) -> Result<RfcRecord> {
        let actor = self.store.get_user(actor_id).await?;
        let pre = self.store.get_rfc(rfc_id).await?;
        permissions::ensure_can_resubmit(&actor, &pre)?;
        let designees = self.resolve_designees(&pre.departments_affected).await?;

        let mut tx = self.store.pool().begin().await?;
        let mut record = Store::get_rfc_with(&mut tx, rfc_id).await?;
        if !matches!(record.status, RfcStatus::Draft | RfcStatus::Rejected) {
            return Err(AppError::transition(
                record.status,
                RfcStatus::PendingDepartmentApproval,
            ));
        }

        let old_status = record.status;
        record.status = RfcStatus::PendingDepartmentApproval;
        record.submitted_at = Some(Utc::now());
        record.clear_review();
        record.department_approvals = fresh_steps(&record.departments_affected, &designees);
        record.updated_at = Utc::now();

        Store::save_rfc_with(&mut tx, &record).await?;
        tx.commit().await?;

        let mut notifications = notify::fan_out(
            &record,
            actor.id,
            &WorkflowEvent::StatusChanged {
                old: old_status,
                new: RfcStatus::PendingDepartmentApproval,
            },
        );
        notifications.extend(notify::fan_out(
            &record,
            actor.id,
            &WorkflowEvent::ApprovalsPending,
        ));
        notify::deliver(&self.store, notifications).await;

        Ok(record)
    }

    /// Record one department's decision and aggregate the overall outcome
    pub async fn decide_department_step(
        &self,
        actor_id: Uuid,
        rfc_id: Uuid,
        department_id: Uuid,
        decision: StepDecision,
        comments: Option<String>,
    ) -> Result<RfcRecord> {
        let actor = self.store.get_user(actor_id).await?;

        // The current registry designee decides, not whoever was stored on
        // the step at submission time
        let department = self.store.find_department(department_id).await?;
        let department_name = department
            .as_ref()
            .map(|d| d.name.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        if !actor.is_admin {
            let designated =
                department.as_ref().and_then(|d| d.approver_user_id) == Some(actor.id);
            if !designated {
                return Err(AppError::PermissionDenied(
                    "only the designated department approver can record this decision".to_string(),
                ));
            }
        }

        let mut tx = self.store.pool().begin().await?;
        let mut record = Store::get_rfc_with(&mut tx, rfc_id).await?;

        if record.status != RfcStatus::PendingDepartmentApproval {
            return Err(AppError::InvalidTransition(format!(
                "cannot record a department decision while status is '{}'",
                record.status.as_str()
            )));
        }
        let step = record
            .department_approvals
            .iter_mut()
            .find(|s| s.department_id == department_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("No approval step for department {}", department_id))
            })?;
        if step.status != StepStatus::Pending {
            return Err(AppError::StepAlreadyDecided(
                step.status.as_str().to_string(),
            ));
        }

        let now = Utc::now();
        step.status = decision.as_step_status();
        step.approver_id = Some(actor.id);
        step.approved_at = Some(now);
        step.comments = comments;

        // Aggregate: one rejection sinks the record; unanimous approval moves
        // it on to final review, or straight to approved when nobody holds
        // the technical authority role.
        let old_status = record.status;
        let any_rejected = record
            .department_approvals
            .iter()
            .any(|s| s.status == StepStatus::Rejected);
        let all_approved = record
            .department_approvals
            .iter()
            .all(|s| s.status == StepStatus::Approved);

        if any_rejected {
            record.status = RfcStatus::Rejected;
            record.reviewer_id = Some(actor.id);
            record.reviewed_at = Some(now);
            record.review_comments =
                Some(format!("Rejected by {} department", department_name));
        } else if all_approved {
            if record.technical_authority_id.is_some() {
                record.status = RfcStatus::PendingFinalReview;
            } else {
                record.status = RfcStatus::Approved;
                record.reviewer_id = Some(actor.id);
                record.reviewed_at = Some(now);
                record.review_comments =
                    Some("Auto-approved: all department approvals received".to_string());
            }
        }
        record.updated_at = now;

        Store::save_rfc_with(&mut tx, &record).await?;
        tx.commit().await?;

        let mut notifications = notify::fan_out(
            &record,
            actor.id,
            &WorkflowEvent::DepartmentDecided {
                department_name,
                decision,
            },
        );
        if record.status != old_status {
            notifications.extend(notify::fan_out(
                &record,
                actor.id,
                &WorkflowEvent::StatusChanged {
                    old: old_status,
                    new: record.status,
                },
            ));
            if record.status == RfcStatus::PendingFinalReview {
                notifications.extend(notify::fan_out(
                    &record,
                    actor.id,
                    &WorkflowEvent::FinalReviewPending,
                ));
            }
        }
        notify::deliver(&self.store, notifications).await;

        Ok(record)
    }

    /// Delete a record and everything hanging off it
    pub async fn delete_rfc(&self, actor_id: Uuid, rfc_id: Uuid) -> Result<()> {
        let actor = self.store.get_user(actor_id).await?;
        let record = self.store.get_rfc(rfc_id).await?;
        permissions::ensure_can_delete(&actor, &record)?;

        let attachments = self.store.list_attachments(rfc_id).await?;
        for attachment in &attachments {
            if let Err(e) = self.blob.delete(&attachment.storage_key).await {
                tracing::warn!(
                    "failed to delete blob {} for {}: {}",
                    attachment.storage_key,
                    record.moc_number,
                    e
                );
            }
        }

        let mut tx = self.store.pool().begin().await?;
        Store::delete_attachments_with(&mut tx, rfc_id).await?;
        Store::delete_notifications_for_rfc_with(&mut tx, rfc_id).await?;
        Store::delete_edit_history_for_rfc_with(&mut tx, rfc_id).await?;
        Store::delete_rfc_with(&mut tx, rfc_id).await?;
        tx.commit().await?;

        tracing::info!("deleted {} ({})", record.moc_number, rfc_id);
        Ok(())
    }

    pub async fn add_attachment(
        &self,
        actor_id: Uuid,
        rfc_id: Uuid,
        storage_key: String,
        file_name: String,
        file_type: String,
        byte_size: Option<i64>,
    ) -> Result<Attachment> {
        let actor = self.store.get_user(actor_id).await?;
        let record = self.store.get_rfc(rfc_id).await?;
        permissions::ensure_can_view(&actor, &record)?;

        let attachment = Attachment {
            id: Uuid::new_v4(),
            rfc_id,
            storage_key,
            file_name,
            file_type,
            byte_size,
            uploaded_by_id: actor.id,
            uploaded_at: Utc::now(),
        };
        self.store.add_attachment(&attachment).await?;
        Ok(attachment)
    }

    /// Records visible to an actor: everything except other users' drafts
    pub async fn list_rfcs_for(
        &self,
        actor_id: Uuid,
        status: Option<RfcStatus>,
    ) -> Result<Vec<RfcRecord>> {
        let actor = self.store.get_user(actor_id).await?;
        let records = self.store.list_rfcs(status).await?;
        Ok(records
            .into_iter()
            .filter(|r| {
                r.status != RfcStatus::Draft || actor.is_admin || r.submitter_id == actor.id
            })
            .collect())
    }

    pub async fn get_rfc_for(&self, actor_id: Uuid, rfc_id: Uuid) -> Result<RfcRecord> {
        let actor = self.store.get_user(actor_id).await?;
        let record = self.store.get_rfc(rfc_id).await?;
        permissions::ensure_can_view(&actor, &record)?;
        Ok(record)
    }
}
