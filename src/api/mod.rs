mod handlers;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::aggregate::Aggregator;
use crate::cache::TtlCache;
use crate::db::Database;

/// Shared state: the database plus the cache-backed aggregator. The
/// cache is injected so tests get isolated instances.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub agg: Aggregator,
}

pub fn create_router(db: Database, cache: TtlCache) -> Router {
    let state = AppState {
        agg: Aggregator::new(db.clone(), cache),
        db,
    };

    let api = Router::new()
        // Users
        .route("/users", get(handlers::list_users))
        .route("/users", post(handlers::create_user))
        // Objectives
        .route("/objectives", get(handlers::list_objectives))
        .route("/objectives", post(handlers::create_objective))
        .route("/objectives/my", get(handlers::my_objectives))
        .route("/objectives/{id}", get(handlers::get_objective))
        .route("/objectives/{id}", put(handlers::update_objective))
        .route("/objectives/{id}", delete(handlers::delete_objective))
        // Dashboard
        .route("/dashboard/metrics", get(handlers::dashboard_metrics))
        // Pulse
        .route("/pulse/requests", post(handlers::create_pulse_request))
        .route("/pulse/requests", get(handlers::list_pulse_requests))
        .route("/pulse/pending", get(handlers::pending_pulse_requests))
        .route("/pulse/responses", post(handlers::submit_pulse_response))
        // Blockers
        .route("/blockers", post(handlers::create_blocker))
        .route("/blockers", get(handlers::list_blockers))
        .route("/blockers/{id}", put(handlers::update_blocker))
        .route("/blockers/{id}", delete(handlers::delete_blocker))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
