use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::orders::Order;
use crate::payment::context::PaymentContext;

pub const FEATURE_TOKENIZATION: &str = "tokenization";

/// Staging keys shared between handlers and gateways.
pub const CTX_PAYMENT_METHOD: &str = "payment_method";
pub const CTX_PAYMENT_TOKEN: &str = "payment_token";
pub const CTX_DEFERRED_INTENT: &str = "deferred_intent";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Gateway timed out")]
    Timeout,

    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub transaction_id: Option<String>,
    pub redirect: Option<String>,
}

/// A concrete, merchant-configured payment backend.
///
/// `supports` is the gateway's capability self-report; not every provider
/// reports correctly, which is why the resolver also consults an allow-list.
pub trait PaymentGateway: Send + Sync {
    fn id(&self) -> &str;

    fn title(&self) -> &str;

    fn supports(&self, _feature: &str) -> bool {
        false
    }

    /// Execute the payment. Timeouts and declines come back as errors and
    /// are interpreted by the handler into a uniform result.
    fn charge(&self, order: &Order, ctx: &PaymentContext) -> Result<ChargeOutcome, GatewayError>;
}

/// Merchant-configured ordered collection of available gateways. The
/// enumeration order is the provider's own; the resolver never re-sorts it.
#[derive(Clone)]
pub struct GatewayProvider {
    gateways: Vec<Arc<dyn PaymentGateway>>,
}

impl GatewayProvider {
    pub fn new(gateways: Vec<Arc<dyn PaymentGateway>>) -> Self {
        Self { gateways }
    }

    /// Default simulated merchant configuration for dev and tests.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            Arc::new(SimulatedCardGateway::new("stripe", "Credit Card (Stripe)", true)),
            Arc::new(SimulatedCardGateway::new(
                "ppcp-gateway",
                "PayPal Commerce Platform",
                false,
            )),
            Arc::new(OfflineGateway::new("bacs", "Direct Bank Transfer")),
            Arc::new(OfflineGateway::new("cod", "Cash on Delivery")),
        ])
    }

    pub fn available(&self) -> &[Arc<dyn PaymentGateway>] {
        &self.gateways
    }

    pub fn get(&self, gateway_id: &str) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.iter().find(|g| g.id() == gateway_id).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }
}

/// Simulated tokenized card gateway. Reads the staged payment token and
/// reproduces the failure modes of a real processor: declines, timeouts,
/// missing tokens.
pub struct SimulatedCardGateway {
    id: String,
    title: String,
    reports_tokenization: bool,
}

impl SimulatedCardGateway {
    pub fn new(id: &str, title: &str, reports_tokenization: bool) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            reports_tokenization,
        }
    }
}

impl PaymentGateway for SimulatedCardGateway {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn supports(&self, feature: &str) -> bool {
        feature == FEATURE_TOKENIZATION && self.reports_tokenization
    }

    fn charge(&self, order: &Order, ctx: &PaymentContext) -> Result<ChargeOutcome, GatewayError> {
        let token = ctx
            .staged(CTX_PAYMENT_TOKEN)
            .ok_or_else(|| GatewayError::Declined("No payment token staged".to_string()))?;

        if token.ends_with("_declined") {
            return Err(GatewayError::Declined("Card was declined".to_string()));
        }
        if token.ends_with("_timeout") {
            return Err(GatewayError::Timeout);
        }

        debug!(
            "Simulated charge of {} {} on {} for order {}",
            order.total,
            order.currency,
            self.id,
            order.id
        );
        Ok(ChargeOutcome {
            transaction_id: Some(format!("txn_{}", uuid::Uuid::new_v4().simple())),
            redirect: None,
        })
    }
}

/// Offline gateway (bank transfer, cash on delivery). No token involved;
/// the order is left for manual capture.
pub struct OfflineGateway {
    id: String,
    title: String,
}

impl OfflineGateway {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
        }
    }
}

impl PaymentGateway for OfflineGateway {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn charge(&self, order: &Order, _ctx: &PaymentContext) -> Result<ChargeOutcome, GatewayError> {
        debug!(
            "Order {} accepted for offline payment via {}",
            order.id, self.id
        );
        Ok(ChargeOutcome {
            transaction_id: None,
            redirect: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;
    use crate::orders::{Order, OrderStatus};
    use chrono::Utc;

    pub(crate) fn sample_order() -> Order {
        Order {
            id: "ucp_order_test".to_string(),
            session_id: "ucp_sess_test".to_string(),
            status: OrderStatus::Pending,
            line_items: Vec::new(),
            shipping_address: Address {
                name: None,
                line1: "1 Test Way".to_string(),
                line2: None,
                city: "Testville".to_string(),
                region: None,
                postal_code: "00000".to_string(),
                country: "US".to_string(),
                phone: None,
                email: None,
            },
            currency: "USD".to_string(),
            total: 1000,
            transaction_id: None,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn card_gateway_charges_staged_token() {
        let gateway = SimulatedCardGateway::new("stripe", "Stripe", true);
        let mut ctx = PaymentContext::new();
        ctx.stage(CTX_PAYMENT_TOKEN, "pm_ok");

        let outcome = gateway.charge(&sample_order(), &ctx).unwrap();
        assert!(outcome.transaction_id.is_some());
    }

    #[test]
    fn card_gateway_declines_and_times_out() {
        let gateway = SimulatedCardGateway::new("stripe", "Stripe", true);
        let mut ctx = PaymentContext::new();

        ctx.stage(CTX_PAYMENT_TOKEN, "tok_declined");
        assert!(matches!(
            gateway.charge(&sample_order(), &ctx),
            Err(GatewayError::Declined(_))
        ));

        ctx.stage(CTX_PAYMENT_TOKEN, "tok_timeout");
        assert!(matches!(
            gateway.charge(&sample_order(), &ctx),
            Err(GatewayError::Timeout)
        ));
    }

    #[test]
    fn provider_preserves_configuration_order() {
        let provider = GatewayProvider::with_defaults();
        let ids: Vec<&str> = provider.available().iter().map(|g| g.id()).collect();
        assert_eq!(ids, vec!["stripe", "ppcp-gateway", "bacs", "cod"]);
    }
}
