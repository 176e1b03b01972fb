//! Notification fan-out.
//!
//! Recipient sets are computed as pure functions of the record and the event;
//! delivery is best-effort and never fails the workflow mutation that caused
//! it.

use uuid::Uuid;

use crate::models::{Notification, NotificationKind, RfcRecord, RfcStatus, StepDecision};
use crate::store::Store;

/// A workflow side effect that produces notifications
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    StatusChanged { old: RfcStatus, new: RfcStatus },
    DepartmentDecided {
        department_name: String,
        decision: StepDecision,
    },
    Assigned { assignee: Uuid },
    TechnicalAuthorityAssigned { authority: Uuid },
    /// Steps just entered pending: ping each step's designated approver
    ApprovalsPending,
    FinalReviewPending,
}

/// Everyone with a stake in the record, in stable order, excluding the actor
fn interested_parties(record: &RfcRecord, actor_id: Uuid) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::new();
    let candidates = std::iter::once(record.submitter_id)
        .chain(record.assigned_to_id)
        .chain(record.technical_authority_id)
        .chain(record.additional_approver_ids.iter().copied())
        .chain(record.viewer_ids.iter().copied());
    for id in candidates {
        if id != actor_id && !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

pub fn fan_out(record: &RfcRecord, actor_id: Uuid, event: &WorkflowEvent) -> Vec<Notification> {
    let title = record.content.title.as_str();
    let note = |recipient: Uuid, kind: NotificationKind, message: String| {
        Notification::new(recipient, actor_id, record.id, title, kind, message)
    };

    match event {
        WorkflowEvent::StatusChanged { old, new } => interested_parties(record, actor_id)
            .into_iter()
            .map(|recipient| {
                note(
                    recipient,
                    NotificationKind::StatusChange,
                    format!(
                        "{} status changed from {} to {}",
                        record.moc_number,
                        old.human(),
                        new.human()
                    ),
                )
            })
            .collect(),

        WorkflowEvent::DepartmentDecided {
            department_name,
            decision,
        } => {
            let verb = match decision {
                StepDecision::Approved => "approved",
                StepDecision::Rejected => "rejected",
            };
            let mut recipients = vec![record.submitter_id];
            if let Some(assignee) = record.assigned_to_id {
                if !recipients.contains(&assignee) {
                    recipients.push(assignee);
                }
            }
            recipients
                .into_iter()
                .filter(|r| *r != actor_id)
                .map(|recipient| {
                    note(
                        recipient,
                        NotificationKind::DepartmentAction,
                        format!("{} {} {}", department_name, verb, record.moc_number),
                    )
                })
                .collect()
        }

        WorkflowEvent::Assigned { assignee } => {
            if *assignee == actor_id {
                return vec![];
            }
            vec![note(
                *assignee,
                NotificationKind::Assignment,
                format!("You have been assigned to {}: {}", record.moc_number, title),
            )]
        }

        WorkflowEvent::TechnicalAuthorityAssigned { authority } => {
            if *authority == actor_id {
                return vec![];
            }
            vec![note(
                *authority,
                NotificationKind::TechnicalAuthorityAssignment,
                format!(
                    "You have been designated technical authority for {}: {}",
                    record.moc_number, title
                ),
            )]
        }

        WorkflowEvent::ApprovalsPending => record
            .department_approvals
            .iter()
            .filter_map(|step| step.approver_id)
            .filter(|approver| *approver != actor_id)
            .map(|approver| {
                note(
                    approver,
                    NotificationKind::DepartmentApprovalPending,
                    format!("{} awaits your department's approval", record.moc_number),
                )
            })
            .collect(),

        WorkflowEvent::FinalReviewPending => match record.technical_authority_id {
            Some(ta) if ta != actor_id => vec![note(
                ta,
                NotificationKind::FinalReviewPending,
                format!("{} is ready for final review", record.moc_number),
            )],
            _ => vec![],
        },
    }
}

/// Persist a batch of notifications, logging and dropping any that fail
pub async fn deliver(store: &Store, notifications: Vec<Notification>) {
    for notification in notifications {
        if let Err(e) = store.insert_notification(&notification).await {
            tracing::warn!(
                "failed to deliver notification to {}: {}",
                notification.recipient_id,
                e
            );
        }
    }
}
