use axum::{
    extract::State,
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use placement_api::auth::permissions::PermissionMap;
use placement_api::handlers;
use placement_api::middleware::bearer_auth_middleware;
use placement_api::{config, database, AppState};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting placement API in {:?} mode", config.environment);

    let pool = database::connect_pool()
        .await
        .unwrap_or_else(|e| panic!("failed to connect database pool: {}", e));

    let state = AppState::new(pool, PermissionMap::standard());
    let app = app(state);

    // Allow tests or deployments to override port via env
    let port = std::env::var("PLACEMENT_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("placement API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app(state: AppState) -> Router {
    // Protected routes sit behind the bearer-token middleware; everything
    // else is public.
    let protected = Router::new()
        .merge(prospect_routes())
        .merge(client_routes())
        .merge(employer_routes())
        .route_layer(axum_middleware::from_fn(bearer_auth_middleware));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/auth/login", post(handlers::auth::login))
        .merge(protected)
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn prospect_routes() -> Router<AppState> {
    use handlers::prospects;

    Router::new()
        .route("/api/prospects", get(prospects::list).post(prospects::create))
        .route(
            "/api/prospects/:id",
            get(prospects::get).put(prospects::update).delete(prospects::soft_delete),
        )
        .route("/api/prospects/:id/promote", post(prospects::promote))
        .route("/api/prospects/:id/status", patch(prospects::set_status))
        .route("/api/prospects/:id/history", get(prospects::history))
}

fn client_routes() -> Router<AppState> {
    use handlers::clients;

    Router::new()
        .route("/api/clients", get(clients::list).post(clients::create))
        .route("/api/clients/:id", get(clients::get).delete(clients::soft_delete))
        .route("/api/clients/:id/status", patch(clients::set_status))
        .route("/api/clients/:id/history", get(clients::history))
}

fn employer_routes() -> Router<AppState> {
    use handlers::employers;

    Router::new()
        .route("/api/employers", get(employers::list).post(employers::create))
        .route(
            "/api/employers/:id",
            get(employers::get).put(employers::update).delete(employers::soft_delete),
        )
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "name": "Placement API",
        "version": version,
        "description": "Overseas job placement backend",
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "login": "/auth/login (public - token acquisition)",
            "prospects": "/api/prospects[/:id[/promote|/status|/history]] (protected)",
            "clients": "/api/clients[/:id[/status|/history]] (protected)",
            "employers": "/api/employers[/:id] (protected)",
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match database::health_check(&state.pool).await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "status": "degraded",
                "timestamp": now,
                "database_error": e.to_string()
            })),
        ),
    }
}
