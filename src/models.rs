use serde::{Deserialize, Serialize};
use validator::Validate;

/// Reference to a purchasable item as supplied by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemInput {
    pub item: ItemRef,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionCreateRequest {
    pub line_items: Vec<LineItemInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_items: Option<Vec<LineItemInput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_shipping_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionCompleteRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_data: Option<PaymentData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
}

/// Agent-supplied payment proof passed at completion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentData {
    #[serde(default)]
    pub handler_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_last_four: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Street address is required"))]
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal_code: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// One totals entry. Ordering of entries within a `totals` sequence is part
/// of the wire contract: `subtotal` first, `total` last, `shipping` and
/// `tax` only when positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalEntry {
    #[serde(rename = "type")]
    pub total_type: String,
    pub amount: i64,
}

impl TotalEntry {
    pub fn new(total_type: impl Into<String>, amount: i64) -> Self {
        Self {
            total_type: total_type.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub id: String,
    pub name: String,
    pub amount: i64,
}

/// Advertised payment handler entry in the session's `payment` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerDescriptor {
    pub id: String,
    pub name: String,
    pub instrument_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub handlers: Vec<HandlerDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Links {
    pub privacy_policy: String,
    pub terms_of_service: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentConfig {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub options: Vec<ShippingMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    pub id: String,
    pub status: String,
}

/// Full session representation returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: String,
    pub status: crate::session::SessionStatus,
    pub line_items: Vec<crate::session::LineItem>,
    pub currency: String,
    pub totals: Vec<TotalEntry>,
    pub payment: PaymentConfig,
    pub links: Links,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment: Option<FulfillmentConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderView>,
}
