use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::payment::factory::HandlerFactory;
use crate::payment::gateway::{GatewayProvider, PaymentGateway, FEATURE_TOKENIZATION};

/// Protocol handler id a buying agent sends when it has no gateway
/// preference and delegates the choice to the merchant.
pub const AGENT_HANDLER_ID: &str = "ucp_agent";

/// Protocol handler ids mapped onto merchant gateway ids.
const HANDLER_GATEWAY_MAP: [(&str, &str); 4] = [
    ("ucp_stripe", "stripe"),
    ("ucp_paypal", "ppcp-gateway"),
    ("ucp_square", "square_credit_card"),
    ("ucp_braintree", "braintree_credit_card"),
];

/// Maps a protocol-level handler id to an available merchant gateway.
///
/// Tokenization support is judged by the gateway's own capability report
/// OR an allow-list of gateways known to tokenize but under-report it.
#[derive(Clone)]
pub struct GatewayResolver {
    provider: GatewayProvider,
    tokenizing_gateways: HashSet<String>,
}

impl GatewayResolver {
    pub fn new(provider: GatewayProvider) -> Self {
        let tokenizing_gateways = [
            "stripe",
            "stripe_cc",
            "woocommerce_payments",
            "ppcp-gateway",
            "square_credit_card",
            "braintree_credit_card",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            provider,
            tokenizing_gateways,
        }
    }

    /// Extend the tokenization allow-list for merchant-specific gateways.
    pub fn allow_tokenization(&mut self, gateway_id: &str) {
        self.tokenizing_gateways.insert(gateway_id.to_string());
    }

    /// Resolve a handler id to a gateway, or None when no available gateway
    /// matches. Unknown ids are tried verbatim against the gateway list, so
    /// merchant-specific ids keep working without a mapping entry.
    pub fn resolve(
        &self,
        handler_id: &str,
        factory: &HandlerFactory,
    ) -> Option<Arc<dyn PaymentGateway>> {
        if handler_id == AGENT_HANDLER_ID {
            return self.resolve_for_agent(factory);
        }

        let gateway_id = HANDLER_GATEWAY_MAP
            .iter()
            .find(|(handler, _)| *handler == handler_id)
            .map(|(_, gateway)| *gateway)
            .unwrap_or(handler_id);

        self.provider.get(gateway_id)
    }

    /// Agent delegation: prefer a tokenizing gateway a handler can drive,
    /// then any tokenizing gateway, then whatever the merchant lists first.
    fn resolve_for_agent(&self, factory: &HandlerFactory) -> Option<Arc<dyn PaymentGateway>> {
        let available = self.provider.available();
        if available.is_empty() {
            return None;
        }

        if let Some(gateway) = available
            .iter()
            .find(|g| self.supports_tokenization(g.as_ref()) && factory.has_handler(g.as_ref()))
        {
            debug!("agent delegation resolved to {}", gateway.id());
            return Some(gateway.clone());
        }

        if let Some(gateway) = available
            .iter()
            .find(|g| self.supports_tokenization(g.as_ref()))
        {
            return Some(gateway.clone());
        }

        Some(available[0].clone())
    }

    fn supports_tokenization(&self, gateway: &dyn PaymentGateway) -> bool {
        gateway.supports(FEATURE_TOKENIZATION) || self.tokenizing_gateways.contains(gateway.id())
    }
}
