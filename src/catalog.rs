use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::errors::{FieldError, ServiceError};
use crate::orders::Order;
use crate::session::LineItem;

/// Product details as known to the commerce backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub price: i64, // minor units
    pub currency: String,
    /// None means stock is not managed for this product.
    pub stock_quantity: Option<i32>,
    pub is_active: bool,
    pub image_url: Option<String>,
    pub weight_grams: Option<i32>,
}

/// In-memory product catalog standing in for the merchant's backend.
#[derive(Clone)]
pub struct ProductCatalog {
    products: Arc<RwLock<HashMap<String, Product>>>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        let mut products = HashMap::new();

        products.insert(
            "item_123".to_string(),
            Product {
                id: "item_123".to_string(),
                title: "Wireless Mouse".to_string(),
                price: 7999,
                currency: "USD".to_string(),
                stock_quantity: Some(250),
                is_active: true,
                image_url: Some("https://merchant.example.com/images/mouse.jpg".to_string()),
                weight_grams: Some(100),
            },
        );

        products.insert(
            "item_456".to_string(),
            Product {
                id: "item_456".to_string(),
                title: "Mechanical Keyboard".to_string(),
                price: 14900,
                currency: "USD".to_string(),
                stock_quantity: Some(40),
                is_active: true,
                image_url: Some("https://merchant.example.com/images/keyboard.jpg".to_string()),
                weight_grams: Some(900),
            },
        );

        products.insert(
            "test".to_string(),
            Product {
                id: "test".to_string(),
                title: "Test Product".to_string(),
                price: 500,
                currency: "USD".to_string(),
                stock_quantity: Some(1000),
                is_active: true,
                image_url: None,
                weight_grams: Some(500),
            },
        );

        Self {
            products: Arc::new(RwLock::new(products)),
        }
    }

    pub fn get_product(&self, product_id: &str) -> Result<Product, ServiceError> {
        let products = self.products.read().unwrap();
        products
            .get(product_id)
            .filter(|p| p.is_active)
            .cloned()
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found or inactive", product_id))
            })
    }

    /// Live stock re-verification for every line item. Session figures may
    /// be stale by completion time, so this always reads current state.
    pub fn verify_stock(&self, line_items: &[LineItem]) -> Vec<FieldError> {
        let products = self.products.read().unwrap();
        let mut errors = Vec::new();

        for (index, line) in line_items.iter().enumerate() {
            let param = format!("line_items.{}.item.id", index);
            let product = match products.get(&line.item.id).filter(|p| p.is_active) {
                Some(p) => p,
                None => {
                    errors.push(FieldError::new(
                        param,
                        format!("Product not found: {}", line.item.id),
                    ));
                    continue;
                }
            };

            if let Some(stock) = product.stock_quantity {
                if stock <= 0 {
                    errors.push(FieldError::new(
                        param,
                        format!("Product out of stock: {}", product.title),
                    ));
                } else if stock < line.quantity {
                    errors.push(FieldError::new(
                        param,
                        format!(
                            "Insufficient stock for {}. Available: {}, Requested: {}",
                            product.title, stock, line.quantity
                        ),
                    ));
                }
            }
        }

        errors
    }

    /// Deduct stock for a paid order.
    pub fn reduce_stock(&self, order: &Order) {
        let mut products = self.products.write().unwrap();
        for line in &order.line_items {
            if let Some(product) = products.get_mut(&line.item.id) {
                if let Some(stock) = product.stock_quantity {
                    // Concurrent paid orders may overdraw; floor at zero.
                    let remaining = (stock - line.quantity).max(0);
                    product.stock_quantity = Some(remaining);
                    info!(
                        "Reduced stock for {}: {} -> {}",
                        product.id, stock, remaining
                    );
                }
            }
        }
    }

    pub fn add_product(&self, product: Product) {
        let mut products = self.products.write().unwrap();
        debug!("Adding product {}", product.id);
        products.insert(product.id.clone(), product);
    }

    pub fn set_stock(&self, product_id: &str, quantity: i32) -> Result<(), ServiceError> {
        let mut products = self.products.write().unwrap();
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;
        product.stock_quantity = Some(quantity);
        Ok(())
    }
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::new()
    }
}
