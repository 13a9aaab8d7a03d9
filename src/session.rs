use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Address, PaymentData, ShippingMethod, TotalEntry};

/// Lifecycle states of a checkout session.
///
/// `CompleteInProgress` is a write-ahead marker owned by the completion
/// workflow; it is never settable from the outside. A crash between
/// "payment attempted" and "order persisted" leaves the session in this
/// state, visible to any retry instead of silently double-charging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Incomplete,
    RequiresEscalation,
    ReadyForComplete,
    CompleteInProgress,
    Completed,
    Canceled,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Incomplete
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Incomplete => "incomplete",
            Self::RequiresEscalation => "requires_escalation",
            Self::ReadyForComplete => "ready_for_complete",
            Self::CompleteInProgress => "complete_in_progress",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Catalog-resolved details of a purchasable item on a line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemInfo {
    pub id: String,
    pub title: String,
    pub unit_price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// One purchasable entry in a session. Insertion order is display order;
/// the same item id may appear on more than one line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub item: ItemInfo,
    pub quantity: i32,
    pub totals: Vec<TotalEntry>,
}

impl LineItem {
    /// The line's precomputed `subtotal` entry, 0 when absent.
    pub fn subtotal(&self) -> i64 {
        self.totals
            .iter()
            .filter(|t| t.total_type == "subtotal")
            .map(|t| t.amount)
            .sum()
    }
}

/// The checkout session aggregate. All monetary amounts are integers in the
/// currency's minor unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub status: SessionStatus,
    pub line_items: Vec<LineItem>,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_shipping_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_data: Option<PaymentData>,
    #[serde(default)]
    pub calculated_shipping: i64,
    #[serde(default)]
    pub calculated_tax: i64,
    #[serde(default)]
    pub available_shipping_methods: Vec<ShippingMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CheckoutSession {
    pub fn create(line_items: Vec<LineItem>, currency: String, expiry_minutes: i64) -> Self {
        let created_at = Utc::now();
        Self {
            id: generate_session_id(),
            status: SessionStatus::Incomplete,
            line_items,
            currency,
            shipping_address: None,
            selected_shipping_method: None,
            payment_data: None,
            calculated_shipping: 0,
            calculated_tax: 0,
            available_shipping_methods: Vec::new(),
            order_id: None,
            created_at,
            expires_at: created_at + Duration::minutes(expiry_minutes),
        }
    }

    /// Expiry is a live predicate, not a stored state: readers re-check
    /// wall-clock time rather than relying on a background sweep.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn can_complete(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Incomplete | SessionStatus::ReadyForComplete
        ) && !self.is_expired()
    }

    pub fn can_update(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Incomplete | SessionStatus::RequiresEscalation
        ) && !self.is_expired()
    }

    /// Expired sessions can still be canceled for cleanup.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Incomplete
                | SessionStatus::RequiresEscalation
                | SessionStatus::ReadyForComplete
        )
    }

    pub fn mark_ready_for_complete(&mut self) {
        self.status = SessionStatus::ReadyForComplete;
    }

    pub fn mark_requires_escalation(&mut self) {
        self.status = SessionStatus::RequiresEscalation;
    }

    pub fn mark_complete_in_progress(&mut self) {
        self.status = SessionStatus::CompleteInProgress;
    }

    pub fn mark_completed(&mut self, order_id: String) {
        self.status = SessionStatus::Completed;
        self.order_id = Some(order_id);
    }

    pub fn mark_canceled(&mut self) {
        self.status = SessionStatus::Canceled;
    }

    pub fn revert_to(&mut self, status: SessionStatus) {
        self.status = status;
    }

    /// Derive the totals sequence: `subtotal` first, `shipping` and `tax`
    /// only when positive, `total` last.
    pub fn calculate_totals(&self) -> Vec<TotalEntry> {
        let subtotal: i64 = self.line_items.iter().map(LineItem::subtotal).sum();

        let mut totals = vec![TotalEntry::new("subtotal", subtotal)];

        if self.calculated_shipping > 0 {
            totals.push(TotalEntry::new("shipping", self.calculated_shipping));
        }

        if self.calculated_tax > 0 {
            totals.push(TotalEntry::new("tax", self.calculated_tax));
        }

        totals.push(TotalEntry::new(
            "total",
            subtotal + self.calculated_shipping + self.calculated_tax,
        ));

        totals
    }

    pub fn total_amount(&self) -> i64 {
        self.calculate_totals()
            .iter()
            .find(|t| t.total_type == "total")
            .map(|t| t.amount)
            .unwrap_or(0)
    }
}

fn generate_session_id() -> String {
    format!("ucp_sess_{}", Uuid::new_v4().simple())
}
