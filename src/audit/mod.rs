use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::{Actor, RequestMeta};

/// One immutable audit record. `details` is schemaless by design: every
/// entity logs a different shape.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_user_id: Option<Uuid>,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<String>,
    pub method: String,
    pub path: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub status_code: i32,
    pub details: Value,
}

impl AuditEntry {
    pub fn for_request(
        actor: &Actor,
        meta: &RequestMeta,
        action: impl Into<String>,
        entity: impl Into<String>,
        entity_id: Option<String>,
        status_code: i32,
        details: Value,
    ) -> Self {
        Self {
            actor_user_id: Some(actor.user_id),
            action: action.into(),
            entity: entity.into(),
            entity_id,
            method: meta.method.clone(),
            path: meta.path.clone(),
            ip: meta.ip.clone(),
            user_agent: meta.user_agent.clone(),
            status_code,
            details,
        }
    }
}

/// Best-effort audit recorder.
///
/// `record` is a one-way notification emitted after the business transaction
/// has committed: the insert runs on its own task and any failure is logged
/// and swallowed, never surfaced to the caller or the client.
#[derive(Clone)]
pub struct Recorder {
    pool: PgPool,
}

impl Recorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn record(&self, entry: AuditEntry) {
        let pool = self.pool.clone();
        tokio::spawn(async move {
            let result = sqlx::query(
                "INSERT INTO audit_logs \
                 (actor_user_id, action, entity, entity_id, method, path, ip, user_agent, status_code, details, written_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())",
            )
            .bind(entry.actor_user_id)
            .bind(&entry.action)
            .bind(&entry.entity)
            .bind(&entry.entity_id)
            .bind(&entry.method)
            .bind(&entry.path)
            .bind(&entry.ip)
            .bind(&entry.user_agent)
            .bind(entry.status_code)
            .bind(&entry.details)
            .execute(&pool)
            .await;

            if let Err(e) = result {
                tracing::warn!(
                    action = %entry.action,
                    entity = %entry.entity,
                    "audit write failed: {}",
                    e
                );
            }
        });
    }
}
