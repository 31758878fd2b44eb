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
use crate::models::{Prospect, StatusHistoryEntry};
use crate::status::{prospect, TransitionOutcome};
use crate::AppState;

const SORT_COLUMNS: &[&str] = &["full_name", "email", "status", "created_at", "updated_at", "id"];
const DEFAULT_SORT: &str = "created_at DESC, id ASC";

const COLUMNS: &str =
    "id, full_name, email, phone, passport_no, target_country, status, created_at, updated_at, is_deleted";

fn perm(action: Action) -> Permission {
    Permission::new(Resource::Prospects, action)
}

#[derive(Debug, Deserialize)]
pub struct CreateProspect {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub passport_no: Option<String>,
    pub target_country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProspect {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub passport_no: Option<String>,
    pub target_country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub to_status: String,
    pub remarks: Option<String>,
}

fn validate_create(payload: &CreateProspect) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    if payload.full_name.trim().is_empty() {
        issues.push(FieldIssue::new("full_name", "is required"));
    } else if payload.full_name.len() > 200 {
        issues.push(FieldIssue::new("full_name", "must be at most 200 characters"));
    }
    if !payload.email.contains('@') {
        issues.push(FieldIssue::with_value("email", "must be a valid email", json!(payload.email)));
    }
    issues
}

/// GET /api/prospects - list with search, status filter, sort, pagination
pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Prospect>>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Read))?;

    let cfg = &config::config().listing;
    let pattern = listing::search_pattern(query.search.as_deref().unwrap_or(""), cfg.max_search_len);
    let pagination = Pagination::from_params(query.page, query.limit, cfg.default_page_size, cfg.max_page_size);
    let sort_keys = listing::parse_sort_param(query.sort.as_deref().unwrap_or(""));
    let order = listing::order_by(SORT_COLUMNS, &sort_keys, DEFAULT_SORT);

    let predicate = "is_deleted = FALSE \
        AND (full_name ILIKE $1 OR email ILIKE $1 OR passport_no ILIKE $1) \
        AND ($2::text IS NULL OR status = $2)";

    let rows: Vec<Prospect> = sqlx::query_as(&format!(
        "SELECT {} FROM prospects WHERE {} {} LIMIT $3 OFFSET $4",
        COLUMNS, predicate, order
    ))
    .bind(&pattern)
    .bind(&query.status)
    .bind(pagination.limit)
    .bind(pagination.offset)
    .fetch_all(&state.pool)
    .await?;

    // total shares the filter predicate; rows alone can't tell us, being
    // capped at the page size
    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM prospects WHERE {}", predicate))
        .bind(&pattern)
        .bind(&query.status)
        .fetch_one(&state.pool)
        .await?;

    Ok(Json(Page::new(rows, pagination, total)))
}

/// GET /api/prospects/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Prospect>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Read))?;

    let row: Option<Prospect> =
        sqlx::query_as(&format!("SELECT {} FROM prospects WHERE id = $1 AND is_deleted = FALSE", COLUMNS))
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;

    row.map(Json).ok_or_else(|| ApiError::not_found("Prospect not found"))
}

/// POST /api/prospects - create at the head of the pipeline
pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    meta: RequestMeta,
    Json(payload): Json<CreateProspect>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Write))?;

    let issues = validate_create(&payload);
    if !issues.is_empty() {
        return Err(ApiError::validation("Invalid prospect", issues));
    }

    let initial = prospect::ProspectStage::Enquiry.as_str();
    let mut tx = state.pool.begin().await?;

    let row: Prospect = sqlx::query_as(&format!(
        "INSERT INTO prospects (id, full_name, email, phone, passport_no, target_country, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
        COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(payload.full_name.trim())
    .bind(payload.email.trim())
    .bind(&payload.phone)
    .bind(&payload.passport_no)
    .bind(&payload.target_country)
    .bind(initial)
    .fetch_one(&mut *tx)
    .await
    .map_err(crate::database::map_sqlx_error)?;

    // Creation event seeds the ledger: from == to == initial status
    crate::status::append_history(
        &mut tx,
        "prospect_status_history",
        row.id,
        initial,
        initial,
        Some(actor.user_id),
        Some("Prospect created"),
    )
    .await?;

    tx.commit().await?;

    state.audit.record(AuditEntry::for_request(
        &actor,
        &meta,
        "create",
        "prospects",
        Some(row.id.to_string()),
        201,
        json!({ "full_name": row.full_name, "email": row.email }),
    ));

    Ok((StatusCode::CREATED, Json(row)))
}

/// PUT /api/prospects/:id - partial update; unspecified fields keep their
/// current value
pub async fn update(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProspect>,
) -> Result<Json<Prospect>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Write))?;

    if let Some(email) = &payload.email {
        if !email.contains('@') {
            return Err(ApiError::validation(
                "Invalid prospect",
                vec![FieldIssue::with_value("email", "must be a valid email", json!(email))],
            ));
        }
    }

    let row: Option<Prospect> = sqlx::query_as(&format!(
        "UPDATE prospects SET \
           full_name = COALESCE($2, full_name), \
           email = COALESCE($3, email), \
           phone = COALESCE($4, phone), \
           passport_no = COALESCE($5, passport_no), \
           target_country = COALESCE($6, target_country), \
           updated_at = now() \
         WHERE id = $1 AND is_deleted = FALSE RETURNING {}",
        COLUMNS
    ))
    .bind(id)
    .bind(&payload.full_name)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(&payload.passport_no)
    .bind(&payload.target_country)
    .fetch_optional(&state.pool)
    .await
    .map_err(crate::database::map_sqlx_error)?;

    let row = row.ok_or_else(|| ApiError::not_found("Prospect not found"))?;

    state.audit.record(AuditEntry::for_request(
        &actor,
        &meta,
        "update",
        "prospects",
        Some(id.to_string()),
        200,
        json!({ "changed": payload_fields(&payload) }),
    ));

    Ok(Json(row))
}

fn payload_fields(payload: &UpdateProspect) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if payload.full_name.is_some() {
        fields.push("full_name");
    }
    if payload.email.is_some() {
        fields.push("email");
    }
    if payload.phone.is_some() {
        fields.push("phone");
    }
    if payload.passport_no.is_some() {
        fields.push("passport_no");
    }
    if payload.target_country.is_some() {
        fields.push("target_country");
    }
    fields
}

/// POST /api/prospects/:id/promote - guarded pipeline promotion. Backward,
/// sideways, and unrecognized targets are benign no-ops.
pub async fn promote(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusChange>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Transition))?;

    let mut tx = state.pool.begin().await?;
    let outcome = prospect::promote(
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
                "promote",
                "prospects",
                Some(id.to_string()),
                200,
                json!({ "from_status": from, "to_status": to, "remarks": payload.remarks }),
            ));
            Ok(Json(json!({ "ok": true, "from_status": from, "to_status": to })))
        }
        TransitionOutcome::Unchanged { status } => {
            Ok(Json(json!({ "ok": true, "note": "No change", "status": status })))
        }
    }
}

/// PATCH /api/prospects/:id/status - unconditional status set for operator
/// correction; bypasses monotonicity but still writes history.
pub async fn set_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusChange>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Transition))?;

    let mut tx = state.pool.begin().await?;
    let outcome = prospect::set_status(
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
                "prospects",
                Some(id.to_string()),
                200,
                json!({ "from_status": from, "to_status": to, "remarks": payload.remarks }),
            ));
            Ok(Json(json!({ "ok": true, "from_status": from, "to_status": to })))
        }
        // set_status is unconditional; it never reports Unchanged
        TransitionOutcome::Unchanged { status } => {
            Ok(Json(json!({ "ok": true, "note": "No change", "status": status })))
        }
    }
}

/// GET /api/prospects/:id/history - the append-only status ledger
pub async fn history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatusHistoryEntry>>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Read))?;

    let rows: Vec<StatusHistoryEntry> = sqlx::query_as(
        "SELECT entity_id, from_status, to_status, changed_by, changed_at, remarks \
         FROM prospect_status_history WHERE entity_id = $1 ORDER BY changed_at ASC",
    )
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows))
}

/// DELETE /api/prospects/:id - soft delete, irreversible from the API
pub async fn soft_delete(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Delete))?;

    let affected = sqlx::query(
        "UPDATE prospects SET is_deleted = TRUE, updated_at = now() WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .execute(&state.pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(ApiError::not_found("Prospect not found"));
    }

    state.audit.record(AuditEntry::for_request(
        &actor,
        &meta,
        "soft_delete",
        "prospects",
        Some(id.to_string()),
        200,
        json!({}),
    ));

    Ok(Json(json!({ "ok": true })))
}
