use std::cmp::Reverse;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::payment::handlers::{
    CardTokenHandler, GenericTokenHandler, OfflineGatewayHandler, PaymentHandler,
};

struct Inner {
    handlers: Vec<Arc<dyn PaymentHandler>>,
    initialized: bool,
}

/// Ordered collection of payment handlers.
///
/// Handlers are kept sorted by descending priority; registration order
/// breaks ties (the sort is stable). `initialize` registers the built-in
/// handlers exactly once.
#[derive(Clone)]
pub struct HandlerRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                handlers: Vec::new(),
                initialized: false,
            })),
        }
    }

    /// Register the built-in handlers. Idempotent: calling this twice does
    /// not produce duplicate registrations.
    pub fn initialize(&self) {
        let mut inner = self.inner.write().unwrap();
        if inner.initialized {
            return;
        }
        inner.initialized = true;

        Self::insert(&mut inner, Arc::new(CardTokenHandler));
        Self::insert(&mut inner, Arc::new(OfflineGatewayHandler));
        Self::insert(&mut inner, Arc::new(GenericTokenHandler));
        debug!("registered {} built-in payment handlers", inner.handlers.len());
    }

    pub fn register(&self, handler: Arc<dyn PaymentHandler>) {
        let mut inner = self.inner.write().unwrap();
        Self::insert(&mut inner, handler);
    }

    fn insert(inner: &mut Inner, handler: Arc<dyn PaymentHandler>) {
        inner.handlers.push(handler);
        inner
            .handlers
            .sort_by_key(|h| Reverse(h.priority()));
    }

    /// Snapshot of the registered handlers, highest priority first.
    pub fn handlers(&self) -> Vec<Arc<dyn PaymentHandler>> {
        self.inner.read().unwrap().handlers.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        let registry = Self::new();
        registry.initialize();
        registry
    }
}
