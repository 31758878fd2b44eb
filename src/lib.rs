pub mod audit;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod listing;
pub mod middleware;
pub mod models;
pub mod status;

use std::sync::Arc;

use sqlx::PgPool;

use audit::Recorder;
use auth::permissions::PermissionMap;

/// Shared router state. The permission map is read-only after startup; the
/// pool is the only shared mutable resource.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub permissions: Arc<PermissionMap>,
    pub audit: Recorder,
}

impl AppState {
    pub fn new(pool: PgPool, permissions: PermissionMap) -> Self {
        Self {
            audit: Recorder::new(pool.clone()),
            permissions: Arc::new(permissions),
            pool,
        }
    }
}
