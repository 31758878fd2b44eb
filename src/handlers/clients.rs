use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit::AuditEntry;
use crate::auth::permissions::{authorize, Action, Permission, Resource};
use crate::config;
use crate::error::{ApiError, FieldIssue};
use crate::listing::{self, ListQuery, Page, Pagination};
use crate::middleware::{Actor, RequestMeta};
use crate::models::{Client, StatusHistoryEntry};
use crate::status::{client, TransitionOutcome};
use crate::AppState;

const SORT_COLUMNS: &[&str] = &["status", "created_at", "updated_at", "id"];
const DEFAULT_SORT: &str = "created_at DESC, id ASC";

const COLUMNS: &str = "id, prospect_id, status, created_at, updated_at, is_deleted";

fn perm(action: Action) -> Permission {
    Permission::new(Resource::Clients, action)
}

#[derive(Debug, Deserialize)]
pub struct CreateClient {
    pub prospect_id: Uuid,
    /// Initial kanban stage; defaults to SmartCard_InProgress
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub to_status: String,
    pub remarks: Option<String>,
}

/// GET /api/clients - kanban board listing
pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Client>>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Read))?;

    let cfg = &config::config().listing;
    let pagination = Pagination::from_params(query.page, query.limit, cfg.default_page_size, cfg.max_page_size);
    let sort_keys = listing::parse_sort_param(query.sort.as_deref().unwrap_or(""));
    let order = listing::order_by(SORT_COLUMNS, &sort_keys, DEFAULT_SORT);

    let predicate = "is_deleted = FALSE AND ($1::text IS NULL OR status = $1)";

    let rows: Vec<Client> = sqlx::query_as(&format!(
        "SELECT {} FROM clients WHERE {} {} LIMIT $2 OFFSET $3",
        COLUMNS, predicate, order
    ))
    .bind(&query.status)
    .bind(pagination.limit)
    .bind(pagination.offset)
    .fetch_all(&state.pool)
    .await?;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM clients WHERE {}", predicate))
        .bind(&query.status)
        .fetch_one(&state.pool)
        .await?;

    Ok(Json(Page::new(rows, pagination, total)))
}

/// GET /api/clients/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Client>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Read))?;

    let row: Option<Client> =
        sqlx::query_as(&format!("SELECT {} FROM clients WHERE id = $1 AND is_deleted = FALSE", COLUMNS))
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;

    row.map(Json).ok_or_else(|| ApiError::not_found("Client not found"))
}

/// POST /api/clients - convert a prospect to an active placement client.
/// Creation seeds the history ledger in the same transaction.
pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    meta: RequestMeta,
    Json(payload): Json<CreateClient>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Write))?;

    let initial = match &payload.status {
        Some(raw) => client::ClientStage::parse(raw).ok_or_else(|| {
            ApiError::validation(
                "Invalid client",
                vec![FieldIssue::with_value("status", "must be one of the kanban stages", json!(raw))],
            )
        })?,
        None => client::ClientStage::SmartCardInProgress,
    };

    let prospect_exists: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM prospects WHERE id = $1 AND is_deleted = FALSE")
            .bind(payload.prospect_id)
            .fetch_optional(&state.pool)
            .await?;
    if prospect_exists.is_none() {
        return Err(ApiError::validation(
            "Invalid client",
            vec![FieldIssue::with_value("prospect_id", "prospect does not exist", json!(payload.prospect_id))],
        ));
    }

    let mut tx = state.pool.begin().await?;

    let row: Client = sqlx::query_as(&format!(
        "INSERT INTO clients (id, prospect_id, status) VALUES ($1, $2, $3) RETURNING {}",
        COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(payload.prospect_id)
    .bind(initial.as_str())
    .fetch_one(&mut *tx)
    .await
    .map_err(crate::database::map_sqlx_error)?;

    client::seed_history(&mut tx, row.id, initial.as_str(), Some(actor.user_id)).await?;

    tx.commit().await?;

    state.audit.record(AuditEntry::for_request(
        &actor,
        &meta,
        "create",
        "clients",
        Some(row.id.to_string()),
        201,
        json!({ "prospect_id": row.prospect_id, "status": row.status }),
    ));

    Ok((StatusCode::CREATED, Json(row)))
}

/// PATCH /api/clients/:id/status - free-form kanban transition. A move to
/// the current stage succeeds with "No change" and leaves the ledger alone.
pub async fn set_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusChange>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Transition))?;

    let mut tx = state.pool.begin().await?;
    let outcome = client::transition(
        &mut tx,
        id,
        &payload.to_status,
        Some(actor.user_id),
        payload.remarks.as_deref(),
    )
    .await?;
    tx.commit().await?;

    match outcome {
        TransitionOutcome::Applied { from, to } => {
            state.audit.record(AuditEntry::for_request(
                &actor,
                &meta,
                "status_change",
                "clients",
                Some(id.to_string()),
                200,
                json!({ "from_status": from, "to_status": to, "remarks": payload.remarks }),
            ));
            Ok(Json(json!({ "ok": true, "from_status": from, "to_status": to })))
        }
        TransitionOutcome::Unchanged { .. } => Ok(Json(json!({ "ok": true, "note": "No change" }))),
    }
}

/// GET /api/clients/:id/history - time at each stage is reconstructed from
/// this ledger; the creation seed row guarantees it is never empty.
pub async fn history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatusHistoryEntry>>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Read))?;

    let rows: Vec<StatusHistoryEntry> = sqlx::query_as(
        "SELECT entity_id, from_status, to_status, changed_by, changed_at, remarks \
         FROM client_status_history WHERE entity_id = $1 ORDER BY changed_at ASC",
    )
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows))
}

/// DELETE /api/clients/:id - soft delete
pub async fn soft_delete(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Delete))?;

    let affected = sqlx::query(
        "UPDATE clients SET is_deleted = TRUE, updated_at = now() WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .execute(&state.pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(ApiError::not_found("Client not found"));
    }

    state.audit.record(AuditEntry::for_request(
        &actor,
        &meta,
        "soft_delete",
        "clients",
        Some(id.to_string()),
        200,
        json!({}),
    ));

    Ok(Json(json!({ "ok": true })))
}
