use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use ucp_checkout_server::catalog::ProductCatalog;
use ucp_checkout_server::events::EventSender;
use ucp_checkout_server::orders::OrderService;
use ucp_checkout_server::payment::{GatewayProvider, HandlerRegistry, PaymentProcessor};
use ucp_checkout_server::shipping::ShippingCalculator;
use ucp_checkout_server::store::{MemoryStore, RedisStore, SessionRepository, SessionStore};
use ucp_checkout_server::tax::TaxCalculator;
use ucp_checkout_server::{router, AppState, CheckoutService, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .json()
        .init();

    info!("Starting UCP Checkout Server...");

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded");

    // Session store: Redis when configured, in-memory otherwise
    let store: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            let store = RedisStore::new(url).await?;
            info!("Using Redis session store");
            Arc::new(store)
        }
        None => {
            info!("Using in-memory session store");
            Arc::new(MemoryStore::new())
        }
    };
    let repository = SessionRepository::new(store, Duration::from_secs(config.store_ttl_secs));

    // Initialize event sender
    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(1024);
    let event_sender = EventSender::new(event_tx);

    // Spawn event processor
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            info!("Event received: {:?}", event);
            // Process events (emit webhooks, etc.)
        }
    });

    // Commerce backend services
    let catalog = ProductCatalog::new();
    let shipping = ShippingCalculator::new(catalog.clone());
    let tax = TaxCalculator::new();
    let orders = OrderService::new();

    // Payment pipeline
    let processor = Arc::new(PaymentProcessor::new(
        GatewayProvider::with_defaults(),
        HandlerRegistry::new(),
    ));
    info!("Payment pipeline initialized");

    // Initialize checkout service
    let checkout_service = Arc::new(CheckoutService::new(
        repository,
        catalog,
        shipping,
        tax,
        orders,
        processor,
        event_sender,
        config.clone(),
    ));
    info!("Checkout service initialized");

    let app = router(AppState { checkout_service });

    // Bind to address
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
