use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::metrics;
use crate::models::Address;
use crate::session::{CheckoutSession, LineItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

/// An order materialized from a checkout session. Created `Pending` before
/// the payment attempt, then marked `Paid` or `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub session_id: String,
    pub status: OrderStatus,
    pub line_items: Vec<LineItem>,
    pub shipping_address: Address,
    pub currency: String,
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// In-memory order ledger standing in for the commerce backend.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<RwLock<HashMap<String, Order>>>,
}

impl OrderService {
    pub fn new() -> Self {
        Self {
            orders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn create_pending(
        &self,
        session: &CheckoutSession,
        shipping_address: Address,
    ) -> Result<Order, ServiceError> {
        let order = Order {
            id: format!("ucp_order_{}", Uuid::new_v4().simple()),
            session_id: session.id.clone(),
            status: OrderStatus::Pending,
            line_items: session.line_items.clone(),
            shipping_address,
            currency: session.currency.clone(),
            total: session.total_amount(),
            transaction_id: None,
            failure_reason: None,
            created_at: Utc::now(),
        };

        let mut orders = self.orders.write().unwrap();
        orders.insert(order.id.clone(), order.clone());
        metrics::ORDERS_CREATED.inc();
        info!("Created pending order {} for session {}", order.id, session.id);
        Ok(order)
    }

    pub fn mark_paid(
        &self,
        order_id: &str,
        transaction_id: Option<String>,
    ) -> Result<(), ServiceError> {
        self.update(order_id, |order| {
            order.status = OrderStatus::Paid;
            order.transaction_id = transaction_id;
        })
    }

    pub fn mark_failed(&self, order_id: &str, reason: &str) -> Result<(), ServiceError> {
        self.update(order_id, |order| {
            order.status = OrderStatus::Failed;
            order.failure_reason = Some(reason.to_string());
        })
    }

    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.orders.read().unwrap().get(order_id).cloned()
    }

    pub fn orders_for_session(&self, session_id: &str) -> Vec<Order> {
        self.orders
            .read()
            .unwrap()
            .values()
            .filter(|o| o.session_id == session_id)
            .cloned()
            .collect()
    }

    fn update(&self, order_id: &str, apply: impl FnOnce(&mut Order)) -> Result<(), ServiceError> {
        let mut orders = self.orders.write().unwrap();
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        apply(order);
        Ok(())
    }
}

impl Default for OrderService {
    fn default() -> Self {
        Self::new()
    }
}
