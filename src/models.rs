//! Data models for RFC/MOC records and their approval lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an RFC record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfcStatus {
    Draft,
    PendingDepartmentApproval,
    PendingFinalReview,
    Approved,
    Rejected,
    InProgress,
    Completed,
    Cancelled,
}

impl RfcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RfcStatus::Draft => "draft",
            RfcStatus::PendingDepartmentApproval => "pending_department_approval",
            RfcStatus::PendingFinalReview => "pending_final_review",
            RfcStatus::Approved => "approved",
            RfcStatus::Rejected => "rejected",
            RfcStatus::InProgress => "in_progress",
            RfcStatus::Completed => "completed",
            RfcStatus::Cancelled => "cancelled",
        }
    }

    /// Human-readable form used in notification messages
    pub fn human(&self) -> String {
        self.as_str().replace('_', " ")
    }

    /// Statuses in which the submitter/assignee may still edit content
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            RfcStatus::Draft
                | RfcStatus::Rejected
                | RfcStatus::PendingDepartmentApproval
                | RfcStatus::PendingFinalReview
        )
    }

    /// Statuses that are part of a review cycle and get reset on edit
    pub fn is_pending_review(&self) -> bool {
        matches!(
            self,
            RfcStatus::PendingDepartmentApproval | RfcStatus::PendingFinalReview
        )
    }
}

impl std::str::FromStr for RfcStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(RfcStatus::Draft),
            "pending_department_approval" => Ok(RfcStatus::PendingDepartmentApproval),
            "pending_final_review" => Ok(RfcStatus::PendingFinalReview),
            "approved" => Ok(RfcStatus::Approved),
            "rejected" => Ok(RfcStatus::Rejected),
            "in_progress" => Ok(RfcStatus::InProgress),
            "completed" => Ok(RfcStatus::Completed),
            "cancelled" => Ok(RfcStatus::Cancelled),
            _ => Err(format!("Invalid RFC status: {}", s)),
        }
    }
}

/// Status of a single department approval step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Approved => "approved",
            StepStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StepStatus::Pending),
            "approved" => Ok(StepStatus::Approved),
            "rejected" => Ok(StepStatus::Rejected),
            _ => Err(format!("Invalid step status: {}", s)),
        }
    }
}

/// A decision on a department step (cannot be "pending")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDecision {
    Approved,
    Rejected,
}

impl StepDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepDecision::Approved => "approved",
            StepDecision::Rejected => "rejected",
        }
    }

    pub fn as_step_status(&self) -> StepStatus {
        match self {
            StepDecision::Approved => StepStatus::Approved,
            StepDecision::Rejected => StepStatus::Rejected,
        }
    }
}

impl std::str::FromStr for StepDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(StepDecision::Approved),
            "rejected" => Ok(StepDecision::Rejected),
            _ => Err(format!("Invalid step decision: {}", s)),
        }
    }
}

/// Kind of change requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Temporary,
    Permanent,
    Emergency,
}

/// Risk rating used pre- and post-mitigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// One department's required approval within the review stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub department_id: Uuid,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl ApprovalStep {
    /// A fresh pending step for a department with its designated approver
    pub fn pending(department_id: Uuid, approver_id: Option<Uuid>) -> Self {
        Self {
            department_id,
            status: StepStatus::Pending,
            approver_id,
            approved_at: None,
            comments: None,
        }
    }
}

/// Descriptive content of an RFC. Opaque to the workflow engine: it is
/// diffed field-by-field and stored, never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RfcContent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_for_change: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<ChangeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_category_other: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_assessment_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_assessment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hse_impact_assessment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_evaluation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level_pre_mitigation: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_matrix_pre_mitigation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level_post_mitigation: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_matrix_post_mitigation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_change_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_change_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supporting_documents_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stakeholder_review_approvals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date_of_change: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_completion_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_of_completion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_implementation_review: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closeout_approved_by: Option<String>,
}

/// The mutable portion of an RFC supplied on create/update: content plus
/// workflow assignments. Diffed as a whole for edit tracking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RfcPayload {
    #[serde(flatten)]
    pub content: RfcContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_authority_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by_department: Option<Uuid>,
    #[serde(default)]
    pub additional_approver_ids: Vec<Uuid>,
    #[serde(default)]
    pub viewer_ids: Vec<Uuid>,
    #[serde(default)]
    pub departments_affected: Vec<Uuid>,
}

/// An RFC/MOC record: the approval aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RfcRecord {
    pub id: Uuid,
    /// Human-readable sequence string, e.g. `MOC-493021`
    pub moc_number: String,
    pub status: RfcStatus,
    /// Owning identity, immutable after creation
    pub submitter_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_authority_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by_department: Option<Uuid>,
    pub additional_approver_ids: Vec<Uuid>,
    pub viewer_ids: Vec<Uuid>,
    /// Ordered; iteration order of the approval steps follows this
    pub departments_affected: Vec<Uuid>,
    pub department_approvals: Vec<ApprovalStep>,
    pub content: RfcContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub date_raised: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RfcRecord {
    /// The mutable payload view of this record, as diffed on update
    pub fn payload(&self) -> RfcPayload {
        RfcPayload {
            content: self.content.clone(),
            assigned_to_id: self.assigned_to_id,
            technical_authority_id: self.technical_authority_id,
            requested_by_department: self.requested_by_department,
            additional_approver_ids: self.additional_approver_ids.clone(),
            viewer_ids: self.viewer_ids.clone(),
            departments_affected: self.departments_affected.clone(),
        }
    }

    /// Replace the mutable payload in place
    pub fn apply_payload(&mut self, payload: RfcPayload) {
        self.content = payload.content;
        self.assigned_to_id = payload.assigned_to_id;
        self.technical_authority_id = payload.technical_authority_id;
        self.requested_by_department = payload.requested_by_department;
        self.additional_approver_ids = payload.additional_approver_ids;
        self.viewer_ids = payload.viewer_ids;
        self.departments_affected = payload.departments_affected;
    }

    pub fn clear_review(&mut self) {
        self.reviewer_id = None;
        self.reviewed_at = None;
        self.review_comments = None;
    }

    pub fn step_for(&self, department_id: Uuid) -> Option<&ApprovalStep> {
        self.department_approvals
            .iter()
            .find(|s| s.department_id == department_id)
    }
}

/// A registered identity with its role flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub can_create_rfcs: bool,
    pub can_delete_any_rfc: bool,
    pub can_edit_any_rfc: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Display name falling back to email, as shown in audit entries
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

/// Reference data: a department and its designated approver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Kind of notification emitted by the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Assignment,
    TechnicalAuthorityAssignment,
    StatusChange,
    DepartmentAction,
    DepartmentApprovalPending,
    FinalReviewPending,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Assignment => "assignment",
            NotificationKind::TechnicalAuthorityAssignment => "technical_authority_assignment",
            NotificationKind::StatusChange => "status_change",
            NotificationKind::DepartmentAction => "department_action",
            NotificationKind::DepartmentApprovalPending => "department_approval_pending",
            NotificationKind::FinalReviewPending => "final_review_pending",
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assignment" => Ok(NotificationKind::Assignment),
            "technical_authority_assignment" => Ok(NotificationKind::TechnicalAuthorityAssignment),
            "status_change" => Ok(NotificationKind::StatusChange),
            "department_action" => Ok(NotificationKind::DepartmentAction),
            "department_approval_pending" => Ok(NotificationKind::DepartmentApprovalPending),
            "final_review_pending" => Ok(NotificationKind::FinalReviewPending),
            _ => Err(format!("Invalid notification kind: {}", s)),
        }
    }
}

/// A message queued for a recipient. Write-once; only the read flag mutates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub rfc_id: Uuid,
    pub related_title: String,
    pub kind: NotificationKind,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient_id: Uuid,
        actor_id: Uuid,
        rfc_id: Uuid,
        related_title: impl Into<String>,
        kind: NotificationKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            actor_id,
            rfc_id,
            related_title: related_title.into(),
            kind,
            message: message.into(),
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// One changed field within an audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: serde_json::Value,
    pub new_value: serde_json::Value,
}

/// Per-editor latest-diff log entry attached to a record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub rfc_id: Uuid,
    pub editor_id: Uuid,
    pub editor_name: String,
    pub summary: String,
    pub field_changes: Vec<FieldChange>,
    pub edited_at: DateTime<Utc>,
}

/// Metadata for an uploaded attachment; bytes live in an external store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub rfc_id: Uuid,
    /// Opaque locator understood by the external blob store
    pub storage_key: String,
    pub file_name: String,
    pub file_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_size: Option<i64>,
    pub uploaded_by_id: Uuid,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc_status_round_trip() {
        for s in [
            "draft",
            "pending_department_approval",
            "pending_final_review",
            "approved",
            "rejected",
            "in_progress",
            "completed",
            "cancelled",
        ] {
            let status: RfcStatus = s.parse().unwrap();
            assert_eq!(status.as_str(), s);
        }
    }

    #[test]
    fn test_rfc_status_invalid() {
        assert!("bogus".parse::<RfcStatus>().is_err());
    }

    #[test]
    fn test_rfc_status_human() {
        assert_eq!(
            RfcStatus::PendingDepartmentApproval.human(),
            "pending department approval"
        );
    }

    #[test]
    fn test_rfc_status_is_editable() {
        assert!(RfcStatus::Draft.is_editable());
        assert!(RfcStatus::Rejected.is_editable());
        assert!(RfcStatus::PendingDepartmentApproval.is_editable());
        assert!(RfcStatus::PendingFinalReview.is_editable());
        assert!(!RfcStatus::Approved.is_editable());
        assert!(!RfcStatus::InProgress.is_editable());
        assert!(!RfcStatus::Completed.is_editable());
        assert!(!RfcStatus::Cancelled.is_editable());
    }

    #[test]
    fn test_step_status_round_trip() {
        for s in ["pending", "approved", "rejected"] {
            let status: StepStatus = s.parse().unwrap();
            assert_eq!(status.as_str(), s);
        }
    }

    #[test]
    fn test_step_decision_rejects_pending() {
        assert!("pending".parse::<StepDecision>().is_err());
        assert_eq!(
            "approved".parse::<StepDecision>().unwrap().as_step_status(),
            StepStatus::Approved
        );
    }

    #[test]
    fn test_approval_step_pending() {
        let dept = Uuid::new_v4();
        let approver = Uuid::new_v4();
        let step = ApprovalStep::pending(dept, Some(approver));
        assert_eq!(step.department_id, dept);
        assert_eq!(step.status, StepStatus::Pending);
        assert_eq!(step.approver_id, Some(approver));
        assert!(step.approved_at.is_none());
        assert!(step.comments.is_none());
    }

    #[test]
    fn test_notification_kind_round_trip() {
        for s in [
            "assignment",
            "technical_authority_assignment",
            "status_change",
            "department_action",
            "department_approval_pending",
            "final_review_pending",
        ] {
            let kind: NotificationKind = s.parse().unwrap();
            assert_eq!(kind.as_str(), s);
        }
    }

    #[test]
    fn test_payload_round_trip_through_record() {
        let mut record = RfcRecord {
            id: Uuid::new_v4(),
            moc_number: "MOC-000001".to_string(),
            status: RfcStatus::Draft,
            submitter_id: Uuid::new_v4(),
            assigned_to_id: None,
            technical_authority_id: None,
            requested_by_department: None,
            additional_approver_ids: vec![],
            viewer_ids: vec![],
            departments_affected: vec![],
            department_approvals: vec![],
            content: RfcContent {
                title: "Pump swap".to_string(),
                ..Default::default()
            },
            reviewer_id: None,
            reviewed_at: None,
            review_comments: None,
            submitted_at: None,
            date_raised: Utc::now(),
            updated_at: Utc::now(),
        };

        let mut payload = record.payload();
        payload.content.description = "Replace P-101".to_string();
        payload.assigned_to_id = Some(Uuid::new_v4());
        record.apply_payload(payload.clone());

        assert_eq!(record.payload(), payload);
    }

    #[test]
    fn test_payload_serde_flattens_content() {
        let payload = RfcPayload {
            content: RfcContent {
                title: "T".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["title"], "T");
        assert!(json.get("content").is_none());
    }

    #[test]
    fn test_user_display_name_falls_back_to_email() {
        let user = User {
            id: Uuid::new_v4(),
            name: String::new(),
            email: "ops@example.com".to_string(),
            is_admin: false,
            can_create_rfcs: true,
            can_delete_any_rfc: false,
            can_edit_any_rfc: false,
            department_id: None,
            created_at: Utc::now(),
        };
        assert_eq!(user.display_name(), "ops@example.com");
    }

    #[test]
    fn test_step_for() {
        let d1 = Uuid::new_v4();
        let d2 = Uuid::new_v4();
        let record = RfcRecord {
            id: Uuid::new_v4(),
            moc_number: "MOC-000002".to_string(),
            status: RfcStatus::PendingDepartmentApproval,
            submitter_id: Uuid::new_v4(),
            assigned_to_id: None,
            technical_authority_id: None,
            requested_by_department: None,
            additional_approver_ids: vec![],
            viewer_ids: vec![],
            departments_affected: vec![d1, d2],
            department_approvals: vec![
                ApprovalStep::pending(d1, None),
                ApprovalStep::pending(d2, None),
            ],
            content: RfcContent::default(),
            reviewer_id: None,
            reviewed_at: None,
            review_comments: None,
            submitted_at: None,
            date_raised: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(record.step_for(d1).is_some());
        assert!(record.step_for(Uuid::new_v4()).is_none());
    }
}
