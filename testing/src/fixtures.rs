use anyhow::Context;

use rfq_negotiator_component::{LineItem, PriorityWeights};
use rfq_negotiators::{Catalog, NegotiationRequest, SupplierProfile};

const CATALOG: &str = include_str!("../assets/catalog.yaml");
const SUPPLIERS: &str = include_str!("../assets/suppliers.yaml");

pub fn sample_catalog() -> anyhow::Result<Catalog> {
    serde_yaml::from_str(CATALOG).context("Parsing sample catalog")
}

pub fn sample_suppliers() -> anyhow::Result<Vec<SupplierProfile>> {
    serde_yaml::from_str(SUPPLIERS).context("Parsing sample suppliers")
}

pub fn sample_supplier(id: &str) -> anyhow::Result<SupplierProfile> {
    sample_suppliers()?
        .into_iter()
        .find(|supplier| supplier.id == id)
        .with_context(|| format!("No sample supplier [{}]", id))
}

/// 120 desks and 120 chairs, valued equally on all criteria.
pub fn sample_request() -> NegotiationRequest {
    NegotiationRequest {
        line_items: vec![
            LineItem {
                product_id: "desk-oak".to_string(),
                quantity: 120,
            },
            LineItem {
                product_id: "chair-mesh".to_string(),
                quantity: 120,
            },
        ],
        priorities: PriorityWeights::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_parse() {
        let catalog = sample_catalog().unwrap();
        assert_eq!(catalog.get("desk-oak").unwrap().base_price, 120.0);

        let suppliers = sample_suppliers().unwrap();
        assert_eq!(suppliers.len(), 3);
        assert_eq!(sample_supplier("steady-works").unwrap().price_multiplier, 1.0);
        assert!(sample_supplier("unknown").is_err());
    }

    #[test]
    fn test_sample_pricing() {
        let catalog = sample_catalog().unwrap();
        let supplier = sample_supplier("premium-furniture").unwrap();
        let pricing = catalog.price_line_items(&sample_request().line_items, &supplier);

        // desk 150.0, chair 56.25, both with 5% discount.
        assert_eq!(pricing.average_reference_price, Some(103.13));
        assert!(pricing.skipped.is_empty());
    }
}
