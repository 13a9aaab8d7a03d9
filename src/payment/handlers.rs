use tracing::debug;

use crate::models::{HandlerDescriptor, PaymentData};
use crate::orders::Order;
use crate::payment::context::PaymentContext;
use crate::payment::gateway::{
    GatewayError, PaymentGateway, CTX_DEFERRED_INTENT, CTX_PAYMENT_METHOD, CTX_PAYMENT_TOKEN,
    FEATURE_TOKENIZATION,
};
use crate::payment::result::{PaymentResult, PrepareResult};

/// Strategy for processing payments against one or more gateways.
///
/// Execution contract: prepare stages gateway-native state, process invokes
/// the gateway and interprets its result, finalize releases staged state.
/// Finalize runs on success and on failure, including when prepare failed.
pub trait PaymentHandler: Send + Sync {
    /// True if this handler can process payments for the gateway.
    fn supports(&self, gateway: &dyn PaymentGateway) -> bool;

    /// Higher priority handlers are checked first.
    fn priority(&self) -> i32;

    fn prepare(
        &self,
        order: &Order,
        gateway: &dyn PaymentGateway,
        payment_data: &PaymentData,
        ctx: &mut PaymentContext,
    ) -> PrepareResult;

    fn process(
        &self,
        order: &Order,
        gateway: &dyn PaymentGateway,
        ctx: &PaymentContext,
    ) -> PaymentResult;

    fn finalize(
        &self,
        order: &Order,
        gateway: &dyn PaymentGateway,
        result: &PaymentResult,
        ctx: &mut PaymentContext,
    );

    /// Manifest contribution: how this handler advertises the gateway in
    /// the session's `payment.handlers` section.
    fn describe(&self, gateway: &dyn PaymentGateway) -> HandlerDescriptor {
        HandlerDescriptor {
            id: gateway.id().to_string(),
            name: format!("dev.ucp.payment.{}", normalize_gateway_name(gateway.id())),
            instrument_types: self.instrument_types(gateway),
        }
    }

    fn instrument_types(&self, _gateway: &dyn PaymentGateway) -> Vec<String> {
        vec!["card".to_string()]
    }
}

/// Invoke the gateway and fold its error modes into a uniform result.
/// A timeout is a payment failure, never a fault.
fn charge_via_gateway(
    order: &Order,
    gateway: &dyn PaymentGateway,
    ctx: &PaymentContext,
) -> PaymentResult {
    match gateway.charge(order, ctx) {
        Ok(outcome) => PaymentResult::success(
            "Payment processed successfully",
            outcome.redirect,
            outcome.transaction_id,
        ),
        Err(GatewayError::Declined(msg)) => PaymentResult::failure(msg),
        Err(GatewayError::Timeout) => {
            PaymentResult::failure(format!("Payment gateway {} timed out", gateway.id()))
        }
        Err(GatewayError::Unavailable(msg)) => {
            PaymentResult::failure(format!("Payment gateway unavailable: {}", msg))
        }
    }
}

fn normalize_gateway_name(gateway_id: &str) -> String {
    gateway_id
        .trim_end_matches("_gateway")
        .trim_end_matches("_credit_card")
        .trim_end_matches("_cc")
        .replace(['-', ' '], "_")
        .to_lowercase()
}

const CARD_TOKEN_PREFIXES: [&str; 4] = ["pm_", "src_", "ctoken_", "tok_"];

/// Handler for tokenized card gateways. Validates and transforms the
/// credential token into gateway-native staged fields.
pub struct CardTokenHandler;

impl CardTokenHandler {
    const GATEWAY_IDS: [&'static str; 3] = ["stripe", "stripe_cc", "woocommerce_payments"];
}

impl PaymentHandler for CardTokenHandler {
    fn supports(&self, gateway: &dyn PaymentGateway) -> bool {
        Self::GATEWAY_IDS.contains(&gateway.id()) || gateway.id().contains("stripe")
    }

    fn priority(&self) -> i32 {
        100
    }

    fn prepare(
        &self,
        _order: &Order,
        gateway: &dyn PaymentGateway,
        payment_data: &PaymentData,
        ctx: &mut PaymentContext,
    ) -> PrepareResult {
        let token = payment_data
            .credential
            .as_ref()
            .map(|c| c.token.as_str())
            .unwrap_or("");

        if token.is_empty() {
            return PrepareResult::failure("No payment token provided for card payment");
        }
        if !CARD_TOKEN_PREFIXES.iter().any(|p| token.starts_with(p)) {
            return PrepareResult::failure(format!(
                "Unrecognized card token format for gateway {}",
                gateway.id()
            ));
        }

        ctx.stage(CTX_PAYMENT_METHOD, gateway.id());
        ctx.stage(CTX_PAYMENT_TOKEN, token);
        ctx.stage(CTX_DEFERRED_INTENT, "true");

        PrepareResult::success("Card payment prepared")
    }

    fn process(
        &self,
        order: &Order,
        gateway: &dyn PaymentGateway,
        ctx: &PaymentContext,
    ) -> PaymentResult {
        charge_via_gateway(order, gateway, ctx)
    }

    fn finalize(
        &self,
        _order: &Order,
        gateway: &dyn PaymentGateway,
        result: &PaymentResult,
        ctx: &mut PaymentContext,
    ) {
        ctx.remove(CTX_PAYMENT_TOKEN);
        ctx.remove(CTX_DEFERRED_INTENT);
        ctx.remove(CTX_PAYMENT_METHOD);
        debug!(
            "Finalized card payment on {} (success={})",
            gateway.id(),
            result.success
        );
    }
}

/// Handler for offline gateways (bank transfer, cheque, cash on delivery).
/// No tokenization; the order is held for manual processing.
pub struct OfflineGatewayHandler;

impl OfflineGatewayHandler {
    const GATEWAY_IDS: [&'static str; 3] = ["bacs", "cheque", "cod"];
}

impl PaymentHandler for OfflineGatewayHandler {
    fn supports(&self, gateway: &dyn PaymentGateway) -> bool {
        Self::GATEWAY_IDS.contains(&gateway.id())
    }

    fn priority(&self) -> i32 {
        10
    }

    fn prepare(
        &self,
        _order: &Order,
        gateway: &dyn PaymentGateway,
        _payment_data: &PaymentData,
        ctx: &mut PaymentContext,
    ) -> PrepareResult {
        ctx.stage(CTX_PAYMENT_METHOD, gateway.id());
        PrepareResult::success("Order prepared for offline payment")
    }

    fn process(
        &self,
        order: &Order,
        gateway: &dyn PaymentGateway,
        ctx: &PaymentContext,
    ) -> PaymentResult {
        charge_via_gateway(order, gateway, ctx)
    }

    fn finalize(
        &self,
        _order: &Order,
        _gateway: &dyn PaymentGateway,
        _result: &PaymentResult,
        ctx: &mut PaymentContext,
    ) {
        ctx.remove(CTX_PAYMENT_METHOD);
    }

    fn instrument_types(&self, _gateway: &dyn PaymentGateway) -> Vec<String> {
        // Offline gateways take no payment instrument.
        Vec::new()
    }
}

/// Catch-all fallback handler, registered at the lowest priority so
/// unrecognized gateways degrade gracefully instead of failing outright.
pub struct GenericTokenHandler;

impl GenericTokenHandler {
    const TOKEN_GATEWAYS: [&'static str; 3] =
        ["ppcp-gateway", "square_credit_card", "braintree_credit_card"];
}

impl PaymentHandler for GenericTokenHandler {
    fn supports(&self, gateway: &dyn PaymentGateway) -> bool {
        if Self::TOKEN_GATEWAYS.contains(&gateway.id()) {
            return true;
        }
        if gateway.supports(FEATURE_TOKENIZATION) {
            return true;
        }
        // Last-resort fallback: accept any gateway.
        true
    }

    fn priority(&self) -> i32 {
        1
    }

    fn prepare(
        &self,
        _order: &Order,
        gateway: &dyn PaymentGateway,
        payment_data: &PaymentData,
        ctx: &mut PaymentContext,
    ) -> PrepareResult {
        ctx.stage(CTX_PAYMENT_METHOD, gateway.id());

        if let Some(token) = payment_data
            .credential
            .as_ref()
            .map(|c| c.token.as_str())
            .filter(|t| !t.is_empty())
        {
            ctx.stage(CTX_PAYMENT_TOKEN, token);
        }

        PrepareResult::success("Payment prepared for processing")
    }

    fn process(
        &self,
        order: &Order,
        gateway: &dyn PaymentGateway,
        ctx: &PaymentContext,
    ) -> PaymentResult {
        charge_via_gateway(order, gateway, ctx)
    }

    fn finalize(
        &self,
        _order: &Order,
        _gateway: &dyn PaymentGateway,
        _result: &PaymentResult,
        ctx: &mut PaymentContext,
    ) {
        ctx.clear_staged();
    }

    fn instrument_types(&self, gateway: &dyn PaymentGateway) -> Vec<String> {
        let id = gateway.id().to_lowercase();
        let mut types = Vec::new();

        if id.contains("stripe") || id.contains("square") || id.contains("braintree")
            || id.contains("card") || id.contains("credit")
        {
            types.push("card".to_string());
        }
        if id.contains("paypal") || id.contains("ppcp") {
            types.push("paypal".to_string());
        }
        if id.contains("bank") || id.contains("ach") {
            types.push("bank_account".to_string());
        }

        if types.is_empty() {
            types.push("card".to_string());
        }
        types
    }
}
