//! Typed row structs constructed from store rows at the boundary. Handlers
//! never pass untyped row maps around.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Row from the external user store, used only at login. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub password_hash: String,
}

/// Candidate in the early recruitment pipeline.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Prospect {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub passport_no: Option<String>,
    pub target_country: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub is_deleted: bool,
}

/// Hiring company abroad.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Employer {
    pub id: Uuid,
    pub name: String,
    pub country: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub is_deleted: bool,
}

/// Prospect converted to active placement processing.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub prospect_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub is_deleted: bool,
}

/// One row of an entity's append-only status ledger.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusHistoryEntry {
    pub entity_id: Uuid,
    pub from_status: String,
    pub to_status: String,
    pub changed_by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
    pub remarks: Option<String>,
}
