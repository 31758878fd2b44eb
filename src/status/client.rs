use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{append_history, load_status_for_update, store_status, TransitionOutcome};
use crate::error::{ApiError, FieldIssue};

const TABLE: &str = "clients";
const HISTORY_TABLE: &str = "client_status_history";
const NOT_FOUND: &str = "Client not found";

/// Remark written with the seed history row at client creation, so the
/// ledger never needs a NULL-from special case.
pub const CREATED_REMARK: &str = "Client created";

/// Placement kanban stages. Unordered: any stage may move to any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStage {
    SmartCardInProgress,
    VisaInProgress,
    PaymentPending,
    FlightBookingPending,
    AccommodationPending,
    ApprovedForDeployment,
    Departed,
}

impl ClientStage {
    pub const ALL: [ClientStage; 7] = [
        ClientStage::SmartCardInProgress,
        ClientStage::VisaInProgress,
        ClientStage::PaymentPending,
        ClientStage::FlightBookingPending,
        ClientStage::AccommodationPending,
        ClientStage::ApprovedForDeployment,
        ClientStage::Departed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ClientStage::SmartCardInProgress => "SmartCard_InProgress",
            ClientStage::VisaInProgress => "Visa_InProgress",
            ClientStage::PaymentPending => "Payment_Pending",
            ClientStage::FlightBookingPending => "FlightBooking_Pending",
            ClientStage::AccommodationPending => "Accommodation_Pending",
            ClientStage::ApprovedForDeployment => "Approved_For_Deployment",
            ClientStage::Departed => "Departed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == s)
    }
}

/// Free-form kanban transition. A self-transition (exact string match, no
/// case folding) short-circuits as Unchanged and writes no history row; that
/// is a successful no-op, not a rejection. Every genuine move appends one
/// history row atomically with the status update.
pub async fn transition(
    tx: &mut Transaction<'_, Postgres>,
    client_id: Uuid,
    to_status: &str,
    changed_by: Option<Uuid>,
    remarks: Option<&str>,
) -> Result<TransitionOutcome, ApiError> {
    if ClientStage::parse(to_status).is_none() {
        return Err(ApiError::validation(
            "Unknown client status",
            vec![FieldIssue::with_value(
                "to_status",
                "must be one of the kanban stages",
                serde_json::json!(to_status),
            )],
        ));
    }

    let from_raw = load_status_for_update(tx, TABLE, client_id, NOT_FOUND).await?;

    if from_raw == to_status {
        return Ok(TransitionOutcome::Unchanged { status: from_raw });
    }

    store_status(tx, TABLE, client_id, to_status).await?;
    append_history(tx, HISTORY_TABLE, client_id, &from_raw, to_status, changed_by, remarks).await?;

    Ok(TransitionOutcome::Applied { from: from_raw, to: to_status.to_string() })
}

/// Seed the history ledger for a freshly created client, inside the creation
/// transaction: one row with from == to == the initial stage.
pub async fn seed_history(
    tx: &mut Transaction<'_, Postgres>,
    client_id: Uuid,
    initial_status: &str,
    changed_by: Option<Uuid>,
) -> Result<(), ApiError> {
    append_history(
        tx,
        HISTORY_TABLE,
        client_id,
        initial_status,
        initial_status,
        changed_by,
        Some(CREATED_REMARK),
    )
    .await
}
