//! Pure permission predicates over users and records.
//!
//! An admin satisfies every requirement. All other access derives from the
//! actor's capability flags or their relationship to the record.

use crate::error::{AppError, Result};
use crate::models::{RfcRecord, RfcStatus, User};

/// Who may perform a given status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRequirement {
    Submitter,
    AdminOnly,
    /// Technical authority if one is set, otherwise an additional approver
    FinalReviewer,
    AssigneeOrAdmin,
}

/// The transition table. `None` means the pair is off the table entirely and
/// no actor, admin included, may force it.
pub fn transition_rule(from: RfcStatus, to: RfcStatus) -> Option<RoleRequirement> {
    use RfcStatus::*;
    match (from, to) {
        (Draft, PendingDepartmentApproval) => Some(RoleRequirement::Submitter),
        (PendingDepartmentApproval, Cancelled) => Some(RoleRequirement::Submitter),
        // Admin override goes only to rejected, never straight to approved
        (PendingDepartmentApproval, Rejected) => Some(RoleRequirement::AdminOnly),
        (PendingFinalReview, Approved) => Some(RoleRequirement::FinalReviewer),
        (PendingFinalReview, Rejected) => Some(RoleRequirement::FinalReviewer),
        (PendingFinalReview, Cancelled) => Some(RoleRequirement::Submitter),
        (Approved, InProgress) => Some(RoleRequirement::AssigneeOrAdmin),
        (Approved, Cancelled) => Some(RoleRequirement::Submitter),
        (Rejected, Cancelled) => Some(RoleRequirement::Submitter),
        (InProgress, Completed) => Some(RoleRequirement::AssigneeOrAdmin),
        (InProgress, Cancelled) => Some(RoleRequirement::AdminOnly),
        (Completed, Cancelled) => Some(RoleRequirement::AdminOnly),
        _ => None,
    }
}

pub fn authorize_transition(
    actor: &User,
    record: &RfcRecord,
    requirement: RoleRequirement,
) -> Result<()> {
    if actor.is_admin {
        return Ok(());
    }

    let (allowed, denial) = match requirement {
        RoleRequirement::Submitter => (
            record.submitter_id == actor.id,
            "only the submitter can make this change",
        ),
        RoleRequirement::AdminOnly => (false, "administrator access required"),
        RoleRequirement::AssigneeOrAdmin => (
            record.assigned_to_id == Some(actor.id),
            "only the assignee or an administrator can make this change",
        ),
        RoleRequirement::FinalReviewer => match record.technical_authority_id {
            Some(ta) => (
                ta == actor.id,
                "only the technical authority can record the final decision",
            ),
            None => (
                record.additional_approver_ids.contains(&actor.id),
                "only a designated approver can record the final decision",
            ),
        },
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(denial.to_string()))
    }
}

pub fn ensure_can_create(actor: &User) -> Result<()> {
    if actor.is_admin || actor.can_create_rfcs {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(
            "not permitted to create RFC requests".to_string(),
        ))
    }
}

/// Content edits: submitter or assignee while the record is still in an
/// editable status; the edit-any capability bypasses the status gate.
pub fn ensure_can_edit(actor: &User, record: &RfcRecord) -> Result<()> {
    if actor.is_admin || actor.can_edit_any_rfc {
        return Ok(());
    }
    if !record.status.is_editable() {
        return Err(AppError::PermissionDenied(format!(
            "record is not editable while {}",
            record.status.human()
        )));
    }
    if record.submitter_id == actor.id || record.assigned_to_id == Some(actor.id) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(
            "only the submitter or assignee can edit this record".to_string(),
        ))
    }
}

/// The submitter may delete their own record only before it enters or after
/// it leaves the approval cycle.
pub fn ensure_can_delete(actor: &User, record: &RfcRecord) -> Result<()> {
    if actor.is_admin || actor.can_delete_any_rfc {
        return Ok(());
    }
    let submitter_deletable = matches!(
        record.status,
        RfcStatus::Draft | RfcStatus::Rejected | RfcStatus::Cancelled
    );
    if record.submitter_id == actor.id && submitter_deletable {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(
            "not permitted to delete this record".to_string(),
        ))
    }
}

pub fn ensure_can_resubmit(actor: &User, record: &RfcRecord) -> Result<()> {
    if actor.is_admin || record.submitter_id == actor.id {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(
            "only the submitter can resubmit this record".to_string(),
        ))
    }
}

/// Drafts are private to their submitter
pub fn ensure_can_view(actor: &User, record: &RfcRecord) -> Result<()> {
    if record.status != RfcStatus::Draft
        || actor.is_admin
        || record.submitter_id == actor.id
    {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("RFC {} not found", record.id)))
    }
}
