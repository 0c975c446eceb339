//! HTTP routes.

pub mod callbacks;
pub mod error;
pub mod pages;
pub mod webhooks;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/callback/providers/enablebanking",
            get(callbacks::enablebanking_callback),
        )
        .route("/callback/providers/teller", get(callbacks::teller_callback))
        .route(
            "/callback/providers/teller/webhook",
            post(webhooks::teller_webhook),
        )
        .route(
            "/callback/providers/snaptrade",
            post(webhooks::snaptrade_webhook),
        )
        .route(
            "/callback/providers/saltedge/success",
            post(webhooks::saltedge_success),
        )
        .route(
            "/callback/providers/saltedge/failure",
            post(webhooks::saltedge_failure),
        )
        .route(
            "/callback/providers/saltedge/destroy",
            post(webhooks::saltedge_destroy),
        )
        .route(
            "/callback/providers/saltedge/notify",
            post(webhooks::saltedge_notify),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
