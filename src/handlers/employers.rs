//! Plain CRUD entity with no status machine; the template the other
//! non-status resources follow.

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
use crate::models::Employer;
use crate::AppState;

const SORT_COLUMNS: &[&str] = &["name", "country", "created_at", "updated_at", "id"];
const DEFAULT_SORT: &str = "name ASC, id ASC";

const COLUMNS: &str = "id, name, country, contact_email, contact_phone, created_at, updated_at, is_deleted";

fn perm(action: Action) -> Permission {
    Permission::new(Resource::Employers, action)
}

#[derive(Debug, Deserialize)]
pub struct CreateEmployer {
    pub name: String,
    pub country: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEmployer {
    pub name: Option<String>,
    pub country: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

fn validate_create(payload: &CreateEmployer) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    if payload.name.trim().is_empty() {
        issues.push(FieldIssue::new("name", "is required"));
    }
    if payload.country.trim().is_empty() {
        issues.push(FieldIssue::new("country", "is required"));
    }
    if let Some(email) = &payload.contact_email {
        if !email.contains('@') {
            issues.push(FieldIssue::with_value("contact_email", "must be a valid email", json!(email)));
        }
    }
    issues
}

/// GET /api/employers
pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Employer>>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Read))?;

    let cfg = &config::config().listing;
    let pattern = listing::search_pattern(query.search.as_deref().unwrap_or(""), cfg.max_search_len);
    let pagination = Pagination::from_params(query.page, query.limit, cfg.default_page_size, cfg.max_page_size);
    let sort_keys = listing::parse_sort_param(query.sort.as_deref().unwrap_or(""));
    let order = listing::order_by(SORT_COLUMNS, &sort_keys, DEFAULT_SORT);

    let predicate = "is_deleted = FALSE AND (name ILIKE $1 OR country ILIKE $1)";

    let rows: Vec<Employer> = sqlx::query_as(&format!(
        "SELECT {} FROM employers WHERE {} {} LIMIT $2 OFFSET $3",
        COLUMNS, predicate, order
    ))
    .bind(&pattern)
    .bind(pagination.limit)
    .bind(pagination.offset)
    .fetch_all(&state.pool)
    .await?;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM employers WHERE {}", predicate))
        .bind(&pattern)
        .fetch_one(&state.pool)
        .await?;

    Ok(Json(Page::new(rows, pagination, total)))
}

/// GET /api/employers/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Employer>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Read))?;

    let row: Option<Employer> =
        sqlx::query_as(&format!("SELECT {} FROM employers WHERE id = $1 AND is_deleted = FALSE", COLUMNS))
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;

    row.map(Json).ok_or_else(|| ApiError::not_found("Employer not found"))
}

/// POST /api/employers
pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    meta: RequestMeta,
    Json(payload): Json<CreateEmployer>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Write))?;

    let issues = validate_create(&payload);
    if !issues.is_empty() {
        return Err(ApiError::validation("Invalid employer", issues));
    }

    let row: Employer = sqlx::query_as(&format!(
        "INSERT INTO employers (id, name, country, contact_email, contact_phone) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {}",
        COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(payload.name.trim())
    .bind(payload.country.trim())
    .bind(&payload.contact_email)
    .bind(&payload.contact_phone)
    .fetch_one(&state.pool)
    .await
    .map_err(crate::database::map_sqlx_error)?;

    state.audit.record(AuditEntry::for_request(
        &actor,
        &meta,
        "create",
        "employers",
        Some(row.id.to_string()),
        201,
        json!({ "name": row.name, "country": row.country }),
    ));

    Ok((StatusCode::CREATED, Json(row)))
}

/// PUT /api/employers/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEmployer>,
) -> Result<Json<Employer>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Write))?;

    let row: Option<Employer> = sqlx::query_as(&format!(
        "UPDATE employers SET \
           name = COALESCE($2, name), \
           country = COALESCE($3, country), \
           contact_email = COALESCE($4, contact_email), \
           contact_phone = COALESCE($5, contact_phone), \
           updated_at = now() \
         WHERE id = $1 AND is_deleted = FALSE RETURNING {}",
        COLUMNS
    ))
    .bind(id)
    .bind(&payload.name)
    .bind(&payload.country)
    .bind(&payload.contact_email)
    .bind(&payload.contact_phone)
    .fetch_optional(&state.pool)
    .await
    .map_err(crate::database::map_sqlx_error)?;

    let row = row.ok_or_else(|| ApiError::not_found("Employer not found"))?;

    state.audit.record(AuditEntry::for_request(
        &actor,
        &meta,
        "update",
        "employers",
        Some(id.to_string()),
        200,
        json!({ "changed": payload_fields(&payload) }),
    ));

    Ok(Json(row))
}

fn payload_fields(payload: &UpdateEmployer) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if payload.name.is_some() {
        fields.push("name");
    }
    if payload.country.is_some() {
        fields.push("country");
    }
    if payload.contact_email.is_some() {
        fields.push("contact_email");
    }
    if payload.contact_phone.is_some() {
        fields.push("contact_phone");
    }
    fields
}

/// DELETE /api/employers/:id - soft delete
pub async fn soft_delete(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state.permissions, actor.role, perm(Action::Delete))?;

    let affected = sqlx::query(
        "UPDATE employers SET is_deleted = TRUE, updated_at = now() WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(id)
    .execute(&state.pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(ApiError::not_found("Employer not found"));
    }

    state.audit.record(AuditEntry::for_request(
        &actor,
        &meta,
        "soft_delete",
        "employers",
        Some(id.to_string()),
        200,
        json!({}),
    ));

    Ok(Json(json!({ "ok": true })))
}
