pub mod client;
pub mod prospect;

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::ApiError;

/// Result of asking an engine to move an entity to a new status.
///
/// A refused or redundant transition is reported as Unchanged, never as an
/// error and never collapsed into a bare boolean, so callers can decide how
/// to surface it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied { from: String, to: String },
    Unchanged { status: String },
}

/// Append one row to an entity's status-history ledger, inside the caller's
/// transaction. `table` is always a compile-time constant, never user input.
pub(crate) async fn append_history(
    tx: &mut Transaction<'_, Postgres>,
    table: &'static str,
    entity_id: Uuid,
    from_status: &str,
    to_status: &str,
    changed_by: Option<Uuid>,
    remarks: Option<&str>,
) -> Result<(), ApiError> {
    let sql = format!(
        "INSERT INTO {} (entity_id, from_status, to_status, changed_by, changed_at, remarks) \
         VALUES ($1, $2, $3, $4, now(), $5)",
        table
    );
    sqlx::query(&sql)
        .bind(entity_id)
        .bind(from_status)
        .bind(to_status)
        .bind(changed_by)
        .bind(remarks)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Load the current status of a status-bearing row, taking a row lock so
/// concurrent transitions on the same entity serialize in the store.
pub(crate) async fn load_status_for_update(
    tx: &mut Transaction<'_, Postgres>,
    table: &'static str,
    entity_id: Uuid,
    not_found: &str,
) -> Result<String, ApiError> {
    let sql = format!(
        "SELECT status FROM {} WHERE id = $1 AND is_deleted = FALSE FOR UPDATE",
        table
    );
    let row: Option<(String,)> = sqlx::query_as(&sql)
        .bind(entity_id)
        .fetch_optional(&mut **tx)
        .await?;

    row.map(|(status,)| status)
        .ok_or_else(|| ApiError::not_found(not_found.to_string()))
}

/// Update the stored status of a row. History stays consistent because this
/// only ever runs next to append_history in one transaction.
pub(crate) async fn store_status(
    tx: &mut Transaction<'_, Postgres>,
    table: &'static str,
    entity_id: Uuid,
    to_status: &str,
) -> Result<(), ApiError> {
    let sql = format!(
        "UPDATE {} SET status = $2, updated_at = now() WHERE id = $1",
        table
    );
    sqlx::query(&sql)
        .bind(entity_id)
        .bind(to_status)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
