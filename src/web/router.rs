use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::web::{
    AppState, auth, print_requests,
    proxy::{self, ProxyTrust},
};

/// Oversized bodies are refused with 413 by the limit layer, before any
/// extractor (including authentication) runs.
pub fn build_router(state: AppState) -> Router {
    let max_body = state.config().max_upload_bytes;

    Router::new()
        .route("/healthz", get(healthz))
        .route("/login", post(auth::process_login))
        .route("/logout", post(auth::logout))
        .route("/api/register", post(auth::register))
        .route("/api/token", post(auth::issue_token))
        .route("/api/me", get(auth::current_user))
        .route(
            "/api/print-requests",
            get(print_requests::list_print_requests).post(print_requests::create_print_request),
        )
        .route(
            "/api/admin/print-requests/:id/status",
            post(print_requests::update_print_request_status),
        )
        .route(
            "/api/admin/print-requests/:id/file",
            get(print_requests::download_print_request_file),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(TraceLayer::new_for_http().make_span_with(proxy::request_span))
        .layer(middleware::from_fn_with_state(
            ProxyTrust::default(),
            proxy::trust_forwarded_headers,
        ))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
