use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;
use super::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::config))
        .route("/tools", get(handlers::tools))
        .route("/ask", post(handlers::ask))
        .route("/ask/simple", post(handlers::ask_simple))
        .with_state(state)
}
