use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::audit::AuditEntry;
use crate::auth::permissions::Role;
use crate::auth::{issue_token, Claims};
use crate::error::{ApiError, FieldIssue};
use crate::middleware::RequestMeta;
use crate::models::UserRecord;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn parse_role(raw: &str) -> Option<Role> {
    match raw.to_ascii_lowercase().as_str() {
        "admin" => Some(Role::Admin),
        "staff" => Some(Role::Staff),
        _ => None,
    }
}

/// POST /auth/login - verify credentials, issue a signed token with the
/// role claim.
pub async fn login(
    State(state): State<AppState>,
    meta: RequestMeta,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut issues = Vec::new();
    if payload.email.trim().is_empty() {
        issues.push(FieldIssue::new("email", "is required"));
    }
    if payload.password.is_empty() {
        issues.push(FieldIssue::new("password", "is required"));
    }
    if !issues.is_empty() {
        return Err(ApiError::validation("Invalid login request", issues));
    }

    let user: Option<UserRecord> = sqlx::query_as(
        "SELECT id, email, name, role, password_hash FROM users WHERE email = $1 AND is_deleted = FALSE",
    )
    .bind(payload.email.trim())
    .fetch_optional(&state.pool)
    .await?;

    // Same response for unknown email and wrong password
    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;
    if hash_password(&payload.password) != user.password_hash {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let role = parse_role(&user.role).ok_or_else(|| {
        tracing::error!("user {} has unrecognized role '{}'", user.id, user.role);
        ApiError::internal(format!("unrecognized role '{}'", user.role))
    })?;

    let claims = Claims::new(user.id, user.email.clone(), role, user.name.clone());
    let token = issue_token(&claims)?;

    state.audit.record(AuditEntry {
        actor_user_id: Some(user.id),
        action: "login".to_string(),
        entity: "users".to_string(),
        entity_id: Some(user.id.to_string()),
        method: meta.method.clone(),
        path: meta.path.clone(),
        ip: meta.ip.clone(),
        user_agent: meta.user_agent.clone(),
        status_code: 200,
        details: json!({ "email": user.email }),
    });

    Ok(Json(json!({
        "token": token,
        "user": {
            "id": user.id,
            "email": user.email,
            "role": role,
            "name": user.name,
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_sha256_hex() {
        assert_eq!(
            hash_password("secret"),
            "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
        );
    }

    #[test]
    fn role_parsing_folds_case() {
        assert_eq!(parse_role("Admin"), Some(Role::Admin));
        assert_eq!(parse_role("staff"), Some(Role::Staff));
        assert_eq!(parse_role("superuser"), None);
    }
}
