pub mod admin;
pub mod auth;
pub mod error;
pub mod events;
pub mod middleware;
pub mod registrations;

use axum::{
    Json, Router,
    routing::{delete, get, post, put},
};
use serde_json::json;
use tracing::error;

use campus_db::Database;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

/// Build the full HTTP surface. Cross-cutting layers (CORS, tracing) are
/// added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/events", get(events::list_events))
        .route("/api/events/{id}", get(events::get_event))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/events", post(events::create_event))
        .route("/api/registrations", post(registrations::register))
        .route("/api/registrations/user", get(registrations::list_mine))
        .route("/api/registrations/{id}", delete(registrations::cancel))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Layers run outside-in: authenticate first, then check the admin flag.
    let admin_routes = Router::new()
        .route("/api/admin/stats", get(admin::stats))
        .route(
            "/api/admin/events",
            get(admin::list_events).post(events::create_event),
        )
        .route(
            "/api/admin/events/{id}",
            put(admin::update_event).delete(admin::delete_event),
        )
        .route("/api/admin/registrations", get(admin::list_registrations))
        .route("/api/admin/users", get(admin::list_users))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Run a blocking read against the database off the async runtime.
pub(crate) async fn db_call<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("storage task failed"))
        })?
        .map_err(ApiError::Internal)
}
