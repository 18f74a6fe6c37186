use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::TryFrom;

use crate::Error;

/// Side of negotiations, that issued an Offer or a message.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    /// Our side. Party that requests quotes and chooses the winner.
    #[display(fmt = "requestor")]
    Requestor,
    /// Supplier we negotiate with.
    #[display(fmt = "supplier")]
    Supplier,
}

impl Party {
    pub fn opposite(self) -> Party {
        match self {
            Party::Requestor => Party::Supplier,
            Party::Supplier => Party::Requestor,
        }
    }
}

/// Concrete set of terms proposed by one side. Offers are never modified
/// after they were recorded in the ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub unit_price: f64,
    pub lead_time_days: u32,
    /// Split notation, for example `30/70` (30% upfront, 70% on delivery).
    pub payment_terms: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Offer {
    pub fn new(unit_price: f64, lead_time_days: u32, payment_terms: impl Into<String>) -> Offer {
        Offer {
            unit_price,
            lead_time_days,
            payment_terms: payment_terms.into(),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Offer {
        self.notes = Some(notes.into());
        self
    }

    /// Checks shape invariants: positive finite price, positive lead time
    /// and non empty payment terms.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.unit_price.is_finite() || self.unit_price <= 0.0 {
            return Err(Error::InvalidOffer(format!(
                "unit price must be positive, got {}",
                self.unit_price
            )));
        }
        if self.lead_time_days == 0 {
            return Err(Error::InvalidOffer("lead time must be positive".into()));
        }
        if self.payment_terms.trim().is_empty() {
            return Err(Error::InvalidOffer("payment terms are empty".into()));
        }
        Ok(())
    }

    /// Upfront percentage from split notation (`30/70` -> 30).
    pub fn upfront_percent(&self) -> Option<f64> {
        upfront_percent(&self.payment_terms)
    }
}

pub fn upfront_percent(terms: &str) -> Option<f64> {
    terms
        .split('/')
        .next()
        .and_then(|upfront| upfront.trim().trim_end_matches('%').parse::<f64>().ok())
        .filter(|upfront| (0.0..=100.0).contains(upfront))
}

impl TryFrom<&Value> for Offer {
    type Error = Error;

    /// Accepts either an Offer object directly or an object wrapping it
    /// under `offer` key, which is how collaborators tend to echo arguments.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let candidate = match value.pointer("/offer") {
            Some(nested) if nested.is_object() => nested,
            _ => value,
        };

        let offer: Offer = serde_json::from_value(candidate.clone())?;
        offer.validate()?;
        Ok(offer)
    }
}
