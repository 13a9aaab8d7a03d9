use axum::{
    extract::{Json, Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::errors::ApiError;
use crate::metrics;
use crate::models::{
    CheckoutSessionCompleteRequest, CheckoutSessionCreateRequest, CheckoutSessionUpdateRequest,
    SessionView,
};
use crate::service::CheckoutService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub checkout_service: Arc<CheckoutService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .route("/checkout_sessions", post(create_checkout_session))
        .route(
            "/checkout_sessions/:checkout_session_id",
            get(get_checkout_session),
        )
        .route(
            "/checkout_sessions/:checkout_session_id",
            post(update_checkout_session),
        )
        .route(
            "/checkout_sessions/:checkout_session_id/complete",
            post(complete_checkout_session),
        )
        .route(
            "/checkout_sessions/:checkout_session_id/cancel",
            post(cancel_checkout_session),
        )
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(track_metrics))
        .with_state(state)
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    metrics::record_http_request(&method, &path, response.status().as_u16(), started);
    response
}

async fn root_handler() -> &'static str {
    "UCP Checkout Server"
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "ucp-checkout-server",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn readiness_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "ready": true
    }))
}

async fn metrics_handler() -> Result<String, ApiError> {
    metrics::gather_metrics()
        .map_err(|e| ApiError::Service(crate::errors::ServiceError::InternalError(e.to_string())))
}

/// Create a checkout session
async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CheckoutSessionCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.checkout_service.create_session(payload).await?;

    // Echo the agent's correlation headers back on the response.
    let mut response_headers = axum::http::HeaderMap::new();
    if let Some(idempotency_key) = headers.get("Idempotency-Key") {
        response_headers.insert("Idempotency-Key", idempotency_key.clone());
    }
    if let Some(request_id) = headers.get("Request-Id") {
        response_headers.insert("Request-Id", request_id.clone());
    }

    Ok((StatusCode::CREATED, response_headers, Json(session)))
}

/// Get checkout session
async fn get_checkout_session(
    State(state): State<AppState>,
    Path(checkout_session_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state
        .checkout_service
        .get_session(&checkout_session_id)
        .await?;

    Ok(Json(session))
}

/// Update checkout session
async fn update_checkout_session(
    State(state): State<AppState>,
    Path(checkout_session_id): Path<String>,
    Json(payload): Json<CheckoutSessionUpdateRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state
        .checkout_service
        .update_session(&checkout_session_id, payload)
        .await?;

    Ok(Json(session))
}

/// Complete checkout session
async fn complete_checkout_session(
    State(state): State<AppState>,
    Path(checkout_session_id): Path<String>,
    Json(payload): Json<CheckoutSessionCompleteRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state
        .checkout_service
        .complete_session(&checkout_session_id, payload)
        .await?;

    Ok(Json(session))
}

/// Cancel checkout session
async fn cancel_checkout_session(
    State(state): State<AppState>,
    Path(checkout_session_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state
        .checkout_service
        .cancel_session(&checkout_session_id)
        .await?;

    Ok(Json(session))
}
