use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use ucp_checkout_server::catalog::ProductCatalog;
use ucp_checkout_server::events::EventSender;
use ucp_checkout_server::orders::OrderService;
use ucp_checkout_server::payment::{GatewayProvider, HandlerRegistry, PaymentProcessor};
use ucp_checkout_server::shipping::ShippingCalculator;
use ucp_checkout_server::store::{MemoryStore, SessionRepository};
use ucp_checkout_server::tax::TaxCalculator;
use ucp_checkout_server::{router, AppState, CheckoutService, Config};

/// Build the full application with an in-memory store for black-box tests.
pub async fn setup_test_app() -> Router {
    let repository =
        SessionRepository::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600));
    let catalog = ProductCatalog::new();

    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(256);
    tokio::spawn(async move { while event_rx.recv().await.is_some() {} });

    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        log_level: "debug".to_string(),
        currency: "USD".to_string(),
        session_expiry_minutes: 360,
        store_ttl_secs: 3600,
        redis_url: None,
        base_url: "http://localhost:8080".to_string(),
    };

    let checkout_service = Arc::new(CheckoutService::new(
        repository,
        catalog.clone(),
        ShippingCalculator::new(catalog.clone()),
        TaxCalculator::new(),
        OrderService::new(),
        Arc::new(PaymentProcessor::new(
            GatewayProvider::with_defaults(),
            HandlerRegistry::new(),
        )),
        EventSender::new(event_tx),
        config,
    ));

    router(AppState { checkout_service })
}

pub async fn send_json(app: &Router, method: &str, uri: &str, body: Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn send_get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
