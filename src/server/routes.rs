use axum::routing::{get, post};
use axum::Router;

use crate::server::api::{self, AppState};

pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/combat", post(api::start_combat))
        .route("/api/combat/:id/end", post(api::end_combat))
        .route("/api/combat/:id/report", get(api::report))
        .route("/api/combat/:id/chronicle", get(api::chronicle))
        .route("/api/combat/:id/advice", get(api::advice))
        .route("/api/combat/:id/log.csv", get(api::log_csv))
        .route(
            "/api/combat/:id/side-effects",
            get(api::side_effects).post(api::retry_side_effects),
        )
        .route("/api/users/:user_id/history", get(api::history))
        .route("/api/forecast", post(api::forecast))
        .fallback(api::not_found)
        .with_state(service)
}
