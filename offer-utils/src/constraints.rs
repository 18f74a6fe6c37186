use serde::{Deserialize, Serialize};

use crate::Offer;

/// Limits, that Offer must meet to be acceptable for us.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferConstraints {
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub max_lead_time: Option<u32>,
    #[serde(default)]
    pub allowed_payment_terms: Option<Vec<String>>,
}

#[derive(thiserror::Error, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConstraintViolation {
    #[error("Unit price {price} is below minimum {min}")]
    PriceBelowMinimum { price: f64, min: f64 },
    #[error("Unit price {price} exceeds maximum {max}")]
    PriceAboveMaximum { price: f64, max: f64 },
    #[error("Lead time of {days} days exceeds maximum of {max} days")]
    LeadTimeTooLong { days: u32, max: u32 },
    #[error("Payment terms '{terms}' are not one of allowed: {}", .allowed.join(", "))]
    PaymentTermsNotAllowed { terms: String, allowed: Vec<String> },
}

/// Checks Offer against all constraints and returns every violated one.
/// Empty result means, that Offer is acceptable.
pub fn validate_offer(offer: &Offer, constraints: &OfferConstraints) -> Vec<ConstraintViolation> {
    let mut violations = vec![];

    if let Some(min) = constraints.min_price {
        if offer.unit_price < min {
            violations.push(ConstraintViolation::PriceBelowMinimum {
                price: offer.unit_price,
                min,
            });
        }
    }

    if let Some(max) = constraints.max_price {
        if offer.unit_price > max {
            violations.push(ConstraintViolation::PriceAboveMaximum {
                price: offer.unit_price,
                max,
            });
        }
    }

    if let Some(max) = constraints.max_lead_time {
        if offer.lead_time_days > max {
            violations.push(ConstraintViolation::LeadTimeTooLong {
                days: offer.lead_time_days,
                max,
            });
        }
    }

    if let Some(allowed) = &constraints.allowed_payment_terms {
        if !allowed
            .iter()
            .any(|terms| terms.trim() == offer.payment_terms.trim())
        {
            violations.push(ConstraintViolation::PaymentTermsNotAllowed {
                terms: offer.payment_terms.clone(),
                allowed: allowed.clone(),
            });
        }
    }

    violations
}
