use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{append_history, load_status_for_update, store_status, TransitionOutcome};
use crate::error::{ApiError, FieldIssue};

const TABLE: &str = "prospects";
const HISTORY_TABLE: &str = "prospect_status_history";
const NOT_FOUND: &str = "Prospect not found";

/// The recruitment pipeline, a strictly ordered sequence. The guarded
/// promotion path never moves a prospect backward or sideways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProspectStage {
    Enquiry,
    JobMatched,
    JobmatchApproved,
    ApplicationDrafted,
    ApplicationSubmitted,
    InterviewScheduled,
    InterviewPassed,
}

impl ProspectStage {
    pub const ALL: [ProspectStage; 7] = [
        ProspectStage::Enquiry,
        ProspectStage::JobMatched,
        ProspectStage::JobmatchApproved,
        ProspectStage::ApplicationDrafted,
        ProspectStage::ApplicationSubmitted,
        ProspectStage::InterviewScheduled,
        ProspectStage::InterviewPassed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProspectStage::Enquiry => "enquiry",
            ProspectStage::JobMatched => "job_matched",
            ProspectStage::JobmatchApproved => "jobmatch_approved",
            ProspectStage::ApplicationDrafted => "application_drafted",
            ProspectStage::ApplicationSubmitted => "application_submitted",
            ProspectStage::InterviewScheduled => "interview_scheduled",
            ProspectStage::InterviewPassed => "interview_passed",
        }
    }

    /// Stage lookup for comparison purposes only: case-insensitive, while
    /// persistence keeps whatever casing the caller or the store holds.
    pub fn parse(s: &str) -> Option<Self> {
        let folded = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|stage| stage.as_str() == folded)
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }
}

/// Guarded promotion used by workflow code: only a forward move down the
/// pipeline is applied. An unrecognized target stage and a backward or
/// sideways move are both benign no-ops, reported as Unchanged.
pub async fn promote(
    tx: &mut Transaction<'_, Postgres>,
    prospect_id: Uuid,
    to_status: &str,
    changed_by: Option<Uuid>,
    remarks: Option<&str>,
) -> Result<TransitionOutcome, ApiError> {
    let from_raw = load_status_for_update(tx, TABLE, prospect_id, NOT_FOUND).await?;

    let to_stage = match ProspectStage::parse(to_status) {
        Some(stage) => stage,
        None => return Ok(TransitionOutcome::Unchanged { status: from_raw }),
    };
    // Stored statuses predating the pipeline enum cannot be ranked; refuse to
    // guess and leave the row alone.
    let from_stage = match ProspectStage::parse(&from_raw) {
        Some(stage) => stage,
        None => return Ok(TransitionOutcome::Unchanged { status: from_raw }),
    };

    if to_stage.index() <= from_stage.index() {
        return Ok(TransitionOutcome::Unchanged { status: from_raw });
    }

    store_status(tx, TABLE, prospect_id, to_status).await?;
    append_history(tx, HISTORY_TABLE, prospect_id, &from_raw, to_status, changed_by, remarks).await?;

    Ok(TransitionOutcome::Applied { from: from_raw, to: to_status.to_string() })
}

/// Unconditional status set for operator correction: no monotonicity check,
/// but the move is still recorded in history whatever its direction.
pub async fn set_status(
    tx: &mut Transaction<'_, Postgres>,
    prospect_id: Uuid,
    to_status: &str,
    changed_by: Option<Uuid>,
    remarks: Option<&str>,
) -> Result<TransitionOutcome, ApiError> {
    if ProspectStage::parse(to_status).is_none() {
        return Err(ApiError::validation(
            "Unknown prospect status",
            vec![FieldIssue::with_value(
                "to_status",
                "must be one of the pipeline stages",
                serde_json::json!(to_status),
            )],
        ));
    }

    let from_raw = load_status_for_update(tx, TABLE, prospect_id, NOT_FOUND).await?;

    store_status(tx, TABLE, prospect_id, to_status).await?;
    append_history(tx, HISTORY_TABLE, prospect_id, &from_raw, to_status, changed_by, remarks).await?;

    Ok(TransitionOutcome::Applied { from: from_raw, to: to_status.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered() {
        assert_eq!(ProspectStage::Enquiry.index(), 0);
        assert_eq!(ProspectStage::InterviewPassed.index(), 6);
        assert!(ProspectStage::JobMatched.index() < ProspectStage::InterviewScheduled.index());
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(ProspectStage::parse("Enquiry"), Some(ProspectStage::Enquiry));
        assert_eq!(ProspectStage::parse("  JOB_MATCHED "), Some(ProspectStage::JobMatched));
        assert_eq!(ProspectStage::parse("departed"), None);
    }

    #[test]
    fn every_stage_round_trips_through_parse() {
        for stage in ProspectStage::ALL {
            assert_eq!(ProspectStage::parse(stage.as_str()), Some(stage));
        }
    }
}
