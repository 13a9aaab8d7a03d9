use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::models::Address;

/// Per-region tax rate in basis points (875 = 8.75%).
#[derive(Debug, Clone, Copy)]
struct TaxRate {
    basis_points: i64,
}

const DEFAULT_REGION: &str = "DEFAULT";

/// Destination-based tax calculation over a configurable rate table.
/// Stands in for the merchant's tax engine; amounts stay in minor units.
#[derive(Clone)]
pub struct TaxCalculator {
    rates: Arc<RwLock<HashMap<String, TaxRate>>>,
}

impl TaxCalculator {
    pub fn new() -> Self {
        let mut rates = HashMap::new();
        rates.insert("CA".to_string(), TaxRate { basis_points: 875 });
        rates.insert("NY".to_string(), TaxRate { basis_points: 838 });
        rates.insert("TX".to_string(), TaxRate { basis_points: 825 });
        rates.insert("FL".to_string(), TaxRate { basis_points: 750 });
        rates.insert(DEFAULT_REGION.to_string(), TaxRate { basis_points: 500 });

        Self {
            rates: Arc::new(RwLock::new(rates)),
        }
    }

    /// Tax on `subtotal + shipping`; shipping is taxable.
    pub fn calculate(&self, subtotal: i64, shipping: i64, destination: &Address) -> i64 {
        let rates = self.rates.read().unwrap();
        let rate = destination
            .region
            .as_deref()
            .and_then(|region| rates.get(region))
            .or_else(|| rates.get(DEFAULT_REGION))
            .copied()
            .unwrap_or(TaxRate { basis_points: 0 });

        let taxable = subtotal + shipping;
        taxable * rate.basis_points / 10_000
    }

    pub fn set_rate(&self, region: &str, basis_points: i64) {
        let mut rates = self.rates.write().unwrap();
        rates.insert(region.to_string(), TaxRate { basis_points });
    }
}

impl Default for TaxCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(region: Option<&str>) -> Address {
        Address {
            name: None,
            line1: "1 Test Way".to_string(),
            line2: None,
            city: "Testville".to_string(),
            region: region.map(str::to_string),
            postal_code: "00000".to_string(),
            country: "US".to_string(),
            phone: None,
            email: None,
        }
    }

    #[test]
    fn california_rate_applies() {
        let calc = TaxCalculator::new();
        assert_eq!(calc.calculate(10_000, 0, &address(Some("CA"))), 875);
    }

    #[test]
    fn shipping_is_taxable() {
        let calc = TaxCalculator::new();
        assert_eq!(calc.calculate(10_000, 1_000, &address(Some("CA"))), 962);
    }

    #[test]
    fn unknown_region_uses_default() {
        let calc = TaxCalculator::new();
        assert_eq!(calc.calculate(10_000, 0, &address(Some("ZZ"))), 500);
        assert_eq!(calc.calculate(10_000, 0, &address(None)), 500);
    }
}
