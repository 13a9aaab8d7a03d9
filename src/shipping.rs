use tracing::debug;

use crate::catalog::ProductCatalog;
use crate::models::{Address, ShippingMethod};
use crate::session::LineItem;

const DOMESTIC_COUNTRY: &str = "US";
const FREE_STANDARD_THRESHOLD: i64 = 50_000;

/// Computes available shipping methods and their costs for a destination.
/// Stands in for the merchant's carrier integration; rates are flat with a
/// weight surcharge.
#[derive(Clone)]
pub struct ShippingCalculator {
    catalog: ProductCatalog,
}

impl ShippingCalculator {
    pub fn new(catalog: ProductCatalog) -> Self {
        Self { catalog }
    }

    pub fn available_methods(
        &self,
        destination: &Address,
        line_items: &[LineItem],
    ) -> Vec<ShippingMethod> {
        let weight_grams = self.total_weight(line_items);
        let subtotal: i64 = line_items.iter().map(LineItem::subtotal).sum();
        let weight_surcharge = (weight_grams / 1000) as i64 * 100;

        let mut methods = Vec::new();

        if destination.country == DOMESTIC_COUNTRY {
            let standard = if subtotal >= FREE_STANDARD_THRESHOLD {
                0
            } else {
                599 + weight_surcharge
            };
            methods.push(ShippingMethod {
                id: "standard_shipping".to_string(),
                name: "Standard Shipping (5-7 business days)".to_string(),
                amount: standard,
            });
            methods.push(ShippingMethod {
                id: "express_shipping".to_string(),
                name: "Express Shipping (2-3 business days)".to_string(),
                amount: 1499 + weight_surcharge,
            });
        } else {
            methods.push(ShippingMethod {
                id: "international_shipping".to_string(),
                name: "International Shipping (7-14 business days)".to_string(),
                amount: 2999 + weight_surcharge * 2,
            });
        }

        debug!(
            "Computed {} shipping methods for {} ({}g)",
            methods.len(),
            destination.country,
            weight_grams
        );
        methods
    }

    pub fn method_cost(
        &self,
        method_id: &str,
        destination: &Address,
        line_items: &[LineItem],
    ) -> Option<i64> {
        self.available_methods(destination, line_items)
            .into_iter()
            .find(|m| m.id == method_id)
            .map(|m| m.amount)
    }

    fn total_weight(&self, line_items: &[LineItem]) -> i32 {
        line_items
            .iter()
            .map(|line| {
                let per_unit = self
                    .catalog
                    .get_product(&line.item.id)
                    .ok()
                    .and_then(|p| p.weight_grams)
                    .unwrap_or(0);
                per_unit * line.quantity
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TotalEntry;
    use crate::session::ItemInfo;

    fn address(country: &str) -> Address {
        Address {
            name: Some("Test Buyer".to_string()),
            line1: "123 Main St".to_string(),
            line2: None,
            city: "San Francisco".to_string(),
            region: Some("CA".to_string()),
            postal_code: "94105".to_string(),
            country: country.to_string(),
            phone: None,
            email: None,
        }
    }

    fn line(quantity: i32) -> LineItem {
        LineItem {
            item: ItemInfo {
                id: "test".to_string(),
                title: "Test Product".to_string(),
                unit_price: 500,
                image: None,
            },
            quantity,
            totals: vec![TotalEntry::new("subtotal", 500 * quantity as i64)],
        }
    }

    #[test]
    fn domestic_addresses_get_standard_and_express() {
        let calc = ShippingCalculator::new(ProductCatalog::new());
        let methods = calc.available_methods(&address("US"), &[line(1)]);
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].id, "standard_shipping");
        assert!(methods[0].amount > 0);
    }

    #[test]
    fn international_addresses_get_one_method() {
        let calc = ShippingCalculator::new(ProductCatalog::new());
        let methods = calc.available_methods(&address("DE"), &[line(1)]);
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].id, "international_shipping");
    }

    #[test]
    fn standard_is_free_over_threshold() {
        let calc = ShippingCalculator::new(ProductCatalog::new());
        let methods = calc.available_methods(&address("US"), &[line(120)]);
        assert_eq!(methods[0].amount, 0);
    }

    #[test]
    fn method_cost_resolves_by_id() {
        let calc = ShippingCalculator::new(ProductCatalog::new());
        let cost = calc.method_cost("express_shipping", &address("US"), &[line(1)]);
        assert!(cost.unwrap() >= 1499);
        assert!(calc
            .method_cost("unknown", &address("US"), &[line(1)])
            .is_none());
    }
}
