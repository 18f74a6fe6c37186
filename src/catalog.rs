use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use rfq_builtin_negotiators::round_price;
use rfq_negotiator_component::{LineItem, PricedLineItem, PricingContext};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub material: String,
    pub base_price: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolumeDiscount {
    pub min_quantity: u32,
    pub discount_percent: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupplierProfile {
    pub id: String,
    pub name: String,
    /// Quality rating in 0-5 scale.
    pub quality_rating: f64,
    /// Supplier price level relative to catalog base price.
    #[serde(default = "default_price_multiplier")]
    pub price_multiplier: f64,
    pub default_lead_time_days: u32,
    pub default_payment_terms: String,
    #[serde(default)]
    pub volume_discounts: Vec<VolumeDiscount>,
}

fn default_price_multiplier() -> f64 {
    1.0
}

impl SupplierProfile {
    /// Highest discount tier, that given quantity qualifies for.
    pub fn volume_discount(&self, quantity: u32) -> f64 {
        self.volume_discounts
            .iter()
            .filter(|tier| tier.min_quantity <= quantity)
            .max_by_key(|tier| tier.min_quantity)
            .map(|tier| tier.discount_percent)
            .unwrap_or(0.0)
    }
}

/// Read-only product reference data shared by all negotiations.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Product>", into = "Vec<Product>")]
pub struct Catalog {
    products: HashMap<String, Product>,
}

impl From<Vec<Product>> for Catalog {
    fn from(products: Vec<Product>) -> Self {
        Catalog::new(products)
    }
}

impl From<Catalog> for Vec<Product> {
    fn from(catalog: Catalog) -> Self {
        let mut products = catalog.products.into_values().collect::<Vec<_>>();
        products.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        products
    }
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Catalog {
        Catalog {
            products: products
                .into_iter()
                .map(|product| (product.product_id.clone(), product))
                .collect(),
        }
    }

    pub fn get(&self, product_id: &str) -> Option<&Product> {
        self.products.get(product_id)
    }

    /// Computes reference pricing of requested items for given supplier.
    /// Items missing in catalog are skipped and only listed in result.
    pub fn price_line_items(&self, items: &[LineItem], supplier: &SupplierProfile) -> PricingContext {
        let mut context = PricingContext::default();

        for item in items {
            let product = match self.get(&item.product_id) {
                Some(product) => product,
                None => {
                    log::warn!(
                        "Product [{}] not found in catalog. Skipping it in pricing for supplier [{}].",
                        item.product_id,
                        supplier.id
                    );
                    context.skipped.push(item.product_id.clone());
                    continue;
                }
            };

            let reference_price = round_price(product.base_price * supplier.price_multiplier);
            let discount = supplier.volume_discount(item.quantity);

            context.items.push(PricedLineItem {
                product_id: product.product_id.clone(),
                name: product.name.clone(),
                quantity: item.quantity,
                reference_price,
                volume_discount_percent: discount,
                discounted_price: round_price(reference_price * (1.0 - discount / 100.0)),
            });
        }

        context.average_reference_price =
            weighted_average(&context.items, |item| item.reference_price);
        context.average_discounted_price =
            weighted_average(&context.items, |item| item.discounted_price);
        context
    }
}

fn weighted_average(items: &[PricedLineItem], price: impl Fn(&PricedLineItem) -> f64) -> Option<f64> {
    if items.is_empty() {
        return None;
    }

    let (total, weight) = items.iter().fold((0.0, 0.0), |(total, weight), item| {
        let quantity = item.quantity.max(1) as f64;
        (total + price(item) * quantity, weight + quantity)
    });
    Some(round_price(total / weight))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn catalog() -> Catalog {
        Catalog::new(vec![
            Product {
                product_id: "desk".to_string(),
                name: "Standing desk".to_string(),
                material: "steel".to_string(),
                base_price: 100.0,
            },
            Product {
                product_id: "chair".to_string(),
                name: "Office chair".to_string(),
                material: "oak".to_string(),
                base_price: 50.0,
            },
        ])
    }

    pub fn supplier(id: &str, quality_rating: f64, price_multiplier: f64) -> SupplierProfile {
        SupplierProfile {
            id: id.to_string(),
            name: format!("Supplier {}", id),
            quality_rating,
            price_multiplier,
            default_lead_time_days: 30,
            default_payment_terms: "30/70".to_string(),
            volume_discounts: vec![
                VolumeDiscount {
                    min_quantity: 50,
                    discount_percent: 5.0,
                },
                VolumeDiscount {
                    min_quantity: 100,
                    discount_percent: 10.0,
                },
            ],
        }
    }

    #[test]
    fn test_volume_discount_tiers() {
        let supplier = supplier("s1", 4.0, 1.0);
        assert_eq!(supplier.volume_discount(10), 0.0);
        assert_eq!(supplier.volume_discount(50), 5.0);
        assert_eq!(supplier.volume_discount(250), 10.0);
    }

    #[test]
    fn test_price_line_items() {
        let items = vec![
            LineItem {
                product_id: "desk".to_string(),
                quantity: 100,
            },
            LineItem {
                product_id: "chair".to_string(),
                quantity: 100,
            },
        ];
        let pricing = catalog().price_line_items(&items, &supplier("s1", 4.0, 1.2));

        assert_eq!(pricing.items.len(), 2);
        assert_eq!(pricing.items[0].reference_price, 120.0);
        assert_eq!(pricing.items[0].discounted_price, 108.0);
        assert_eq!(pricing.average_reference_price, Some(90.0));
        assert_eq!(pricing.average_discounted_price, Some(81.0));
        assert!(pricing.skipped.is_empty());
    }

    #[test]
    fn test_missing_products_skipped() {
        let items = vec![
            LineItem {
                product_id: "lamp".to_string(),
                quantity: 5,
            },
            LineItem {
                product_id: "chair".to_string(),
                quantity: 5,
            },
        ];
        let pricing = catalog().price_line_items(&items, &supplier("s1", 4.0, 1.0));

        assert_eq!(pricing.items.len(), 1);
        assert_eq!(pricing.skipped, vec!["lamp".to_string()]);
        assert_eq!(pricing.average_reference_price, Some(50.0));
    }

    #[test]
    fn test_no_matching_products() {
        let items = vec![LineItem {
            product_id: "lamp".to_string(),
            quantity: 5,
        }];
        let pricing = catalog().price_line_items(&items, &supplier("s1", 4.0, 1.0));
        assert_eq!(pricing.average_reference_price, None);
    }

    #[test]
    fn test_catalog_from_yaml() {
        let catalog: Catalog = serde_yaml::from_str(
            "- product_id: desk\n  name: Desk\n  material: steel\n  base_price: 10.5\n",
        )
        .unwrap();
        assert_eq!(catalog.get("desk").unwrap().base_price, 10.5);
    }
}
