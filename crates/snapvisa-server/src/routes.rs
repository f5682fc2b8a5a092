//! Router

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    checkout_cancel, checkout_success, create_checkout, download_photo, health_check,
    list_feedback, reset_session, session_info, stripe_webhook, submit_feedback, upload_photo,
};
use crate::session::session_layer;
use crate::state::AppState;


pub fn router(state: AppState) -> Router {
    // Multipart framing on top of the file itself
    let body_limit = state.config.max_upload_bytes + 64 * 1024;

    // Browser-facing routes; each request is bound to a session
    let session_routes = Router::new()
        .route("/api/session", get(session_info))
        .route("/api/session/reset", post(reset_session))
        .route("/api/upload", post(upload_photo))
        .route("/api/checkout", post(create_checkout))
        .route("/api/download", get(download_photo))
        .route("/api/feedback", post(submit_feedback))
        .route("/checkout/success", get(checkout_success))
        .route("/checkout/cancel", get(checkout_cancel))
        .route_layer(middleware::from_fn_with_state(state.clone(), session_layer));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/webhook/stripe", post(stripe_webhook))
        .route("/admin/feedback", get(list_feedback))
        .merge(session_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
