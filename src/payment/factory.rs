use std::sync::Arc;
use tracing::trace;

use crate::payment::gateway::PaymentGateway;
use crate::payment::handlers::PaymentHandler;
use crate::payment::registry::HandlerRegistry;

/// Selects the payment handler for a gateway: the first registered handler
/// (in descending priority order) that reports support.
#[derive(Clone)]
pub struct HandlerFactory {
    registry: HandlerRegistry,
}

impl HandlerFactory {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    pub fn handler_for(&self, gateway: &dyn PaymentGateway) -> Option<Arc<dyn PaymentHandler>> {
        for handler in self.registry.handlers() {
            if handler.supports(gateway) {
                trace!(
                    "selected handler (priority {}) for gateway {}",
                    handler.priority(),
                    gateway.id()
                );
                return Some(handler);
            }
        }
        None
    }

    pub fn has_handler(&self, gateway: &dyn PaymentGateway) -> bool {
        self.registry.handlers().iter().any(|h| h.supports(gateway))
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }
}
