use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::handlers::{protected, public};
use crate::middleware::require_token;
use crate::state::AppState;

/// Full application router
pub fn app(state: AppState, config: &AppConfig) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        .merge(aggregate_routes())
        // Reads are public, writes need a token
        .merge(record_routes(state.clone()))
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer(&config.security.cors_origins));

    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(public::login_post))
        .route("/auth/refresh", post(public::refresh_post))
}

fn aggregate_routes() -> Router<AppState> {
    Router::new()
        .route("/api/aggregates", get(public::aggregates_get))
        .route("/api/aggregates/:country_code/:year", get(public::aggregate_get))
}

fn record_routes(state: AppState) -> Router<AppState> {
    let gate = from_fn_with_state(state, require_token);

    Router::new()
        // Collection-level operations
        .route(
            "/api/records",
            get(public::records_get).merge(
                post(protected::records_post)
                    .put(protected::records_put)
                    .patch(protected::records_patch)
                    .delete(protected::records_delete)
                    .layer(gate.clone()),
            ),
        )
        // Single record, addressed by its key
        .route(
            "/api/records/:site_id/:year",
            get(public::record_get).merge(
                put(protected::record_put)
                    .delete(protected::record_delete)
                    .layer(gate),
            ),
        )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "MIKE Carcass API",
            "version": version,
            "description": "Elephant carcass counts per MIKE site and year, with country-year totals",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "auth": "/auth/login, /auth/refresh (public - token acquisition)",
                "records": "/api/records[/:site_id/:year] (GET public, writes need a bearer token)",
                "aggregates": "/api/aggregates[/:country_code/:year] (public, ?range=forest)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(state.records.pool()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
