//! Fiscal obligation model and status lifecycle.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Obligation status.
///
/// The transmission subsystem drives most transitions, so the data layer does
/// not enforce the full graph; see [`ObligationStatus::can_transition_to`]
/// for the two rules that are always enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationStatus {
    Pending,
    Generating,
    Generated,
    Transmitted,
    Accepted,
    Rejected,
    Rectified,
}

impl ObligationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObligationStatus::Pending => "pending",
            ObligationStatus::Generating => "generating",
            ObligationStatus::Generated => "generated",
            ObligationStatus::Transmitted => "transmitted",
            ObligationStatus::Accepted => "accepted",
            ObligationStatus::Rejected => "rejected",
            ObligationStatus::Rectified => "rectified",
        }
    }

    /// Lenient parse used when reading persisted rows.
    pub fn from_string(s: &str) -> Self {
        Self::try_from_str(s).unwrap_or(ObligationStatus::Pending)
    }

    /// Strict parse for caller-supplied statuses.
    pub fn try_from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ObligationStatus::Pending),
            "generating" => Some(ObligationStatus::Generating),
            "generated" => Some(ObligationStatus::Generated),
            "transmitted" => Some(ObligationStatus::Transmitted),
            "accepted" => Some(ObligationStatus::Accepted),
            "rejected" => Some(ObligationStatus::Rejected),
            "rectified" => Some(ObligationStatus::Rectified),
            _ => None,
        }
    }

    /// Minimal transition rules that hold regardless of who drives the
    /// lifecycle: an authority verdict requires a prior transmission, and
    /// re-generation is only reachable from the start or after rectifying.
    pub fn can_transition_to(self, next: ObligationStatus) -> bool {
        match next {
            ObligationStatus::Accepted | ObligationStatus::Rejected => {
                self == ObligationStatus::Transmitted
            }
            ObligationStatus::Generating => {
                matches!(self, ObligationStatus::Pending | ObligationStatus::Rectified)
            }
            _ => true,
        }
    }
}

impl std::fmt::Display for ObligationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One regulatory filing due in a tenant/year/month for an obligation code.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FiscalObligation {
    pub obligation_id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub year: i32,
    pub month: i32,
    pub due_date: NaiveDate,
    pub status: String,
    pub receipt_number: Option<String>,
    pub file_name: Option<String>,
    pub file_content: Option<String>,
    pub error_message: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Optional attachments carried by a status update. Which fields are legal
/// depends on the target status; see [`StatusUpdateExtra::allowed_for`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusUpdateExtra {
    pub receipt_number: Option<String>,
    pub file_name: Option<String>,
    pub file_content: Option<String>,
    pub error_message: Option<String>,
}

impl StatusUpdateExtra {
    /// Validates the field bag against the target status: an error message
    /// only accompanies a rejection, a receipt only exists once the filing
    /// was transmitted, and file metadata only exists once it was generated.
    pub fn allowed_for(&self, status: ObligationStatus) -> Result<(), &'static str> {
        if self.error_message.is_some() && status != ObligationStatus::Rejected {
            return Err("error_message is only valid when rejecting an obligation");
        }
        if self.receipt_number.is_some()
            && !matches!(
                status,
                ObligationStatus::Transmitted
                    | ObligationStatus::Accepted
                    | ObligationStatus::Rejected
            )
        {
            return Err("receipt_number is only valid after transmission");
        }
        if (self.file_name.is_some() || self.file_content.is_some())
            && matches!(
                status,
                ObligationStatus::Pending | ObligationStatus::Generating
            )
        {
            return Err("file metadata is only valid once the filing is generated");
        }
        Ok(())
    }
}

/// Calendar entry: a known obligation definition joined with the obligation
/// row for the period, when one exists.
#[derive(Debug, Clone, Serialize)]
pub struct ObligationCalendarEntry {
    pub code: String,
    pub name: String,
    pub due_date: NaiveDate,
    pub obligation_id: Option<Uuid>,
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_requires_transmission() {
        assert!(ObligationStatus::Transmitted.can_transition_to(ObligationStatus::Accepted));
        assert!(ObligationStatus::Transmitted.can_transition_to(ObligationStatus::Rejected));
        assert!(!ObligationStatus::Generated.can_transition_to(ObligationStatus::Accepted));
        assert!(!ObligationStatus::Pending.can_transition_to(ObligationStatus::Rejected));
        assert!(!ObligationStatus::Accepted.can_transition_to(ObligationStatus::Accepted));
    }

    #[test]
    fn generating_only_from_pending_or_rectified() {
        assert!(ObligationStatus::Pending.can_transition_to(ObligationStatus::Generating));
        assert!(ObligationStatus::Rectified.can_transition_to(ObligationStatus::Generating));
        assert!(!ObligationStatus::Rejected.can_transition_to(ObligationStatus::Generating));
        assert!(!ObligationStatus::Transmitted.can_transition_to(ObligationStatus::Generating));
    }

    #[test]
    fn transmission_subsystem_may_jump_forward() {
        // The full graph is not enforced at the data layer.
        assert!(ObligationStatus::Pending.can_transition_to(ObligationStatus::Transmitted));
        assert!(ObligationStatus::Rejected.can_transition_to(ObligationStatus::Rectified));
    }

    #[test]
    fn extras_validated_against_target_status() {
        let extra = StatusUpdateExtra {
            error_message: Some("schema error".to_string()),
            ..Default::default()
        };
        assert!(extra.allowed_for(ObligationStatus::Rejected).is_ok());
        assert!(extra.allowed_for(ObligationStatus::Accepted).is_err());

        let extra = StatusUpdateExtra {
            receipt_number: Some("REC-1".to_string()),
            ..Default::default()
        };
        assert!(extra.allowed_for(ObligationStatus::Transmitted).is_ok());
        assert!(extra.allowed_for(ObligationStatus::Generated).is_err());

        let extra = StatusUpdateExtra {
            file_name: Some("efd.txt".to_string()),
            ..Default::default()
        };
        assert!(extra.allowed_for(ObligationStatus::Generated).is_ok());
        assert!(extra.allowed_for(ObligationStatus::Generating).is_err());
    }

    #[test]
    fn strict_parse_rejects_unknown_status() {
        assert_eq!(ObligationStatus::try_from_str("transmitted"), Some(ObligationStatus::Transmitted));
        assert_eq!(ObligationStatus::try_from_str("archived"), None);
    }
}
