//! Report lifecycle state machine.
//!
//! A daily report starts `pending`. A reviewer either approves it (terminal)
//! or rejects it with a reason; a rejected report may be edited and
//! resubmitted back to `pending`. The guards here are pure; the handlers in
//! [`crate::handlers::reports`] pair them with conditional writes so that two
//! concurrent terminal transitions cannot both succeed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Approved,
    Rejected,
}

impl Default for ReportStatus {
    fn default() -> Self {
        ReportStatus::Pending
    }
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Approved => "approved",
            ReportStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReportStatus::Pending),
            "approved" => Some(ReportStatus::Approved),
            "rejected" => Some(ReportStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    AlreadyApproved,
    AlreadyRejected,
    NotDeletable,
}

impl TransitionError {
    pub fn message(&self) -> &'static str {
        match self {
            TransitionError::AlreadyApproved => "Report is already approved",
            TransitionError::AlreadyRejected => "Report is already rejected",
            TransitionError::NotDeletable => {
                "Cannot delete a report that has been approved or rejected"
            }
        }
    }
}

/// A terminal transition (approve or reject) is only legal from `pending`.
pub fn check_terminal_transition(current: ReportStatus) -> Result<(), TransitionError> {
    match current {
        ReportStatus::Pending => Ok(()),
        ReportStatus::Approved => Err(TransitionError::AlreadyApproved),
        ReportStatus::Rejected => Err(TransitionError::AlreadyRejected),
    }
}

/// Reports are deletable only while still pending.
pub fn check_delete(current: ReportStatus) -> Result<(), TransitionError> {
    match current {
        ReportStatus::Pending => Ok(()),
        _ => Err(TransitionError::NotDeletable),
    }
}

/// An update that explicitly moves a rejected report back to `pending` is a
/// resubmission and owes the prior reviewer a notification.
pub fn is_resubmission(current: ReportStatus, incoming: Option<ReportStatus>) -> bool {
    current == ReportStatus::Rejected && incoming == Some(ReportStatus::Pending)
}

/// Trims the rejection reason, rejecting blank input.
pub fn validate_rejection_reason(reason: &str) -> Option<String> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn approval_notice(date: NaiveDate) -> String {
    format!("The report for {} has been approved", date.format("%Y-%m-%d"))
}

pub fn rejection_notice(date: NaiveDate, reason: &str) -> String {
    format!(
        "The report for {} has been rejected. Reason: {}",
        date.format("%Y-%m-%d"),
        reason
    )
}

pub fn resubmission_notice(date: NaiveDate) -> String {
    format!(
        "The report for {} has been updated and is pending review",
        date.format("%Y-%m-%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
    }

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(ReportStatus::default(), ReportStatus::Pending);
    }

    #[test]
    fn test_parse_round_trips() {
        for status in [
            ReportStatus::Pending,
            ReportStatus::Approved,
            ReportStatus::Rejected,
        ] {
            assert_eq!(ReportStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ReportStatus::parse("archived"), None);
    }

    #[test]
    fn test_terminal_transition_from_pending() {
        assert!(check_terminal_transition(ReportStatus::Pending).is_ok());
    }

    #[test]
    fn test_terminal_transition_from_approved_fails() {
        let err = check_terminal_transition(ReportStatus::Approved).unwrap_err();
        assert_eq!(err, TransitionError::AlreadyApproved);
        assert_eq!(err.message(), "Report is already approved");
    }

    #[test]
    fn test_terminal_transition_from_rejected_fails() {
        let err = check_terminal_transition(ReportStatus::Rejected).unwrap_err();
        assert_eq!(err, TransitionError::AlreadyRejected);
    }

    #[test]
    fn test_delete_only_while_pending() {
        assert!(check_delete(ReportStatus::Pending).is_ok());
        assert_eq!(
            check_delete(ReportStatus::Approved),
            Err(TransitionError::NotDeletable)
        );
        assert_eq!(
            check_delete(ReportStatus::Rejected),
            Err(TransitionError::NotDeletable)
        );
    }

    #[test]
    fn test_resubmission_requires_rejected_to_pending() {
        assert!(is_resubmission(
            ReportStatus::Rejected,
            Some(ReportStatus::Pending)
        ));

        assert!(!is_resubmission(ReportStatus::Rejected, None));
        assert!(!is_resubmission(
            ReportStatus::Rejected,
            Some(ReportStatus::Rejected)
        ));
        assert!(!is_resubmission(
            ReportStatus::Pending,
            Some(ReportStatus::Pending)
        ));
        assert!(!is_resubmission(
            ReportStatus::Approved,
            Some(ReportStatus::Pending)
        ));
    }

    #[test]
    fn test_rejection_reason_is_trimmed() {
        assert_eq!(
            validate_rejection_reason("  incomplete \n"),
            Some("incomplete".to_string())
        );
    }

    #[test]
    fn test_blank_rejection_reason_is_invalid() {
        assert_eq!(validate_rejection_reason(""), None);
        assert_eq!(validate_rejection_reason("   \t "), None);
    }

    #[test]
    fn test_notice_texts_carry_the_report_date() {
        assert_eq!(
            approval_notice(date()),
            "The report for 2024-01-03 has been approved"
        );
        assert_eq!(
            rejection_notice(date(), "incomplete"),
            "The report for 2024-01-03 has been rejected. Reason: incomplete"
        );
        assert!(resubmission_notice(date()).contains("pending review"));
    }
}
