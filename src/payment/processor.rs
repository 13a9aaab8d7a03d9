use thiserror::Error;
use tracing::{info, warn};

use crate::models::{HandlerDescriptor, PaymentData};
use crate::orders::Order;
use crate::payment::context::PaymentContext;
use crate::payment::factory::HandlerFactory;
use crate::payment::gateway::GatewayProvider;
use crate::payment::registry::HandlerRegistry;
use crate::payment::resolver::{GatewayResolver, AGENT_HANDLER_ID};
use crate::payment::result::PaymentResult;

/// Failure before a payment attempt could even start. Distinct from a
/// declined payment, which comes back as an unsuccessful `PaymentResult`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No payment gateway available for handler '{0}'")]
    NoGateway(String),

    #[error("No payment handler registered for gateway '{0}'")]
    NoHandler(String),
}

/// Orchestrates the prepare, process, finalize pipeline for one payment
/// attempt against a materialized order.
#[derive(Clone)]
pub struct PaymentProcessor {
    resolver: GatewayResolver,
    factory: HandlerFactory,
    provider: GatewayProvider,
}

impl PaymentProcessor {
    pub fn new(provider: GatewayProvider, registry: HandlerRegistry) -> Self {
        registry.initialize();
        Self {
            resolver: GatewayResolver::new(provider.clone()),
            factory: HandlerFactory::new(registry),
            provider,
        }
    }

    /// Run the full pipeline. Finalize runs no matter how the attempt ends,
    /// so staged state never outlives the request.
    pub fn process(
        &self,
        order: &Order,
        payment_data: &PaymentData,
    ) -> Result<PaymentResult, PipelineError> {
        let gateway = self
            .resolver
            .resolve(&payment_data.handler_id, &self.factory)
            .ok_or_else(|| PipelineError::NoGateway(payment_data.handler_id.clone()))?;

        let handler = self
            .factory
            .handler_for(gateway.as_ref())
            .ok_or_else(|| PipelineError::NoHandler(gateway.id().to_string()))?;

        let mut ctx = PaymentContext::new();
        ctx.ensure_initialized();

        let prepared = handler.prepare(order, gateway.as_ref(), payment_data, &mut ctx);
        if prepared.is_failure() {
            warn!(
                "payment preparation failed for order {} on {}: {}",
                order.id,
                gateway.id(),
                prepared.message
            );
            let result = PaymentResult::failure(prepared.message.clone());
            handler.finalize(order, gateway.as_ref(), &result, &mut ctx);
            return Ok(result);
        }

        let result = handler.process(order, gateway.as_ref(), &ctx);
        handler.finalize(order, gateway.as_ref(), &result, &mut ctx);

        if result.success {
            info!(
                "payment processed for order {} via {} (txn {:?})",
                order.id,
                gateway.id(),
                result.transaction_id
            );
        } else {
            warn!(
                "payment failed for order {} via {}: {}",
                order.id,
                gateway.id(),
                result.message
            );
        }
        Ok(result)
    }

    /// Manifest of payment handlers advertised on every session view. The
    /// agent-delegation pseudo-handler comes first, then one entry per
    /// gateway a registered handler can drive.
    pub fn available_handlers(&self) -> Vec<HandlerDescriptor> {
        let mut descriptors = vec![HandlerDescriptor {
            id: AGENT_HANDLER_ID.to_string(),
            name: "dev.ucp.payment.agent".to_string(),
            instrument_types: vec!["card".to_string()],
        }];

        for gateway in self.provider.available() {
            if let Some(handler) = self.factory.handler_for(gateway.as_ref()) {
                descriptors.push(handler.describe(gateway.as_ref()));
            }
        }
        descriptors
    }
}
