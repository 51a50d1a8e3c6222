use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::ServerState;

use super::digest;

pub struct AppRouter;

impl AppRouter {
    pub fn create(state: ServerState) -> Router {
        Router::new()
            .route("/", get(|| async { "Mailbrief server" }))
            .route("/digest/run", post(digest::run))
            .route("/digest/date/:date", get(digest::get_by_date))
            .route("/digest/:id/distribute", post(digest::distribute))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
            .fallback(handler_404)
    }
}

pub async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Route does not exist")
}
